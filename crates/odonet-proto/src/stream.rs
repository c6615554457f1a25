//! Incremental packet I/O over async byte streams.
//!
//! A hop sends exactly one packet per direction on each connection, so the
//! reader must cope with arbitrary fragmentation but never with packets
//! running into each other.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    Packet,
    errors::{ProtocolError, Result},
    packet::Scan,
};

/// Bytes requested before the first scan; covers the address and header of
/// any packet within a dozen hops of the root.
const INITIAL_READ: usize = 20;

/// Most buffer space reserved per read. The announced length is not trusted
/// until the bytes actually arrive.
const MAX_READ_CHUNK: usize = 64 * 1024;

/// Read one packet.
///
/// Returns `Ok(None)` if the peer closed the connection without sending a
/// single byte: that is how a hop says "nothing for you".
///
/// # Errors
///
/// - [`ProtocolError::Truncated`] if the stream ends mid-packet
/// - any framing error from [`Packet::scan`]
/// - [`ProtocolError::Io`] for read failures
pub async fn read_packet<R>(reader: &mut R) -> Result<Option<Packet>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(INITIAL_READ);

    let layout = loop {
        match Packet::scan(&buf)? {
            Scan::Complete(layout) => break layout,
            Scan::Incomplete { needed } => {
                let want = needed.max(INITIAL_READ) - buf.len();
                if read_some(reader, &mut buf, want).await? == 0 {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    return Err(ProtocolError::Truncated { expected: needed, actual: buf.len() });
                }
            },
        }
    };

    let total = layout.total_len();
    while buf.len() < total {
        let want = total - buf.len();
        if read_some(reader, &mut buf, want).await? == 0 {
            return Err(ProtocolError::Truncated { expected: total, actual: buf.len() });
        }
    }

    Packet::decode(&buf).map(Some)
}

/// One read of at most `limit` bytes (capped at [`MAX_READ_CHUNK`])
/// appended to `buf`. Zero means EOF.
async fn read_some<R>(reader: &mut R, buf: &mut BytesMut, limit: usize) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let limit = limit.min(MAX_READ_CHUNK);
    buf.reserve(limit);
    let n = (&mut *reader).take(limit as u64).read_buf(buf).await?;
    Ok(n)
}

/// Write one packet and flush.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = packet.to_bytes()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, PacketKind};

    fn sample(size: usize) -> Packet {
        let payload: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        Packet::new("ABCDEFGHIJKLMNOPQRSTUVWXYZ".parse().unwrap(), PacketKind::Blob, payload)
    }

    #[tokio::test]
    async fn reads_packet_split_into_small_chunks() {
        let packet = sample(10_000);
        let wire = packet.to_bytes().unwrap();

        // A 7-byte pipe forces every read to return a fragment.
        let (mut tx, mut rx) = tokio::io::duplex(7);
        let writer = tokio::spawn(async move {
            tx.write_all(&wire).await.unwrap();
            tx.shutdown().await.unwrap();
        });

        let read = read_packet(&mut rx).await.unwrap();
        writer.await.unwrap();

        assert_eq!(read, Some(packet));
    }

    #[tokio::test]
    async fn reads_packet_shorter_than_initial_read() {
        let packet = Packet::new(Address::empty(), PacketKind::Text, &b""[..]);
        let wire = packet.to_bytes().unwrap();

        let mut reader: &[u8] = &wire;
        assert_eq!(read_packet(&mut reader).await.unwrap(), Some(packet));
    }

    #[tokio::test]
    async fn closed_without_bytes_is_none() {
        let mut reader: &[u8] = &[];
        assert_eq!(read_packet(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn closed_mid_payload_is_truncated() {
        let wire = sample(100).to_bytes().unwrap();
        let mut reader: &[u8] = &wire[..60];

        let err = read_packet(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn closed_mid_header_is_truncated() {
        let mut reader: &[u8] = b"AB=\x01";
        assert!(matches!(read_packet(&mut reader).await, Err(ProtocolError::Truncated { .. })));
    }

    #[tokio::test]
    async fn large_claim_does_not_reserve_up_front() {
        // Header announces 60 MiB, then the peer stalls with the stream open.
        let mut wire = b"C=".to_vec();
        wire.extend_from_slice(&(60u32 << 20).to_le_bytes());
        wire.extend_from_slice(&4u16.to_le_bytes());

        let (mut tx, mut rx) = tokio::io::duplex(64);
        tx.write_all(&wire).await.unwrap();

        let mut buf = BytesMut::new();
        let n = read_some(&mut rx, &mut buf, 60 << 20).await.unwrap();
        assert_eq!(n, wire.len());
        assert!(buf.capacity() <= MAX_READ_CHUNK + wire.len());
        drop(tx);
    }

    #[tokio::test]
    async fn write_then_read() {
        let packet = sample(64 * 1024 + 3);
        let (mut tx, mut rx) = tokio::io::duplex(1024);

        let sent = packet.clone();
        let writer = tokio::spawn(async move { write_packet(&mut tx, &sent).await });

        assert_eq!(read_packet(&mut rx).await.unwrap(), Some(packet));
        writer.await.unwrap().unwrap();
    }
}
