//! Parent link quality from `iwlist <device> scan` output.
//!
//! Only cells reporting both `Quality=x/y` and `Signal level=x/y` as ratios
//! count; drivers that report the level in dBm yield no measurement.

/// One access point seen by a scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScannedNetwork {
    /// Cell MAC address
    pub address: String,
    /// Network name
    pub essid: String,
    /// Link quality as a ratio
    pub quality: Option<f64>,
    /// Signal level as a ratio
    pub signal_level: Option<f64>,
}

/// Parse every cell in a scan.
#[must_use]
pub fn parse_scan(output: &str) -> Vec<ScannedNetwork> {
    let mut cells = Vec::new();
    let mut current: Option<ScannedNetwork> = None;

    for line in output.lines().map(str::trim) {
        if let Some((_, address)) = line.split_once("Address:").filter(|_| line.starts_with("Cell")) {
            cells.extend(current.take());
            current = Some(ScannedNetwork { address: address.trim().to_string(), ..Default::default() });
            continue;
        }

        let Some(cell) = current.as_mut() else {
            continue;
        };

        if let Some(essid) = line.strip_prefix("ESSID:") {
            cell.essid = essid.trim_matches('"').to_string();
        } else if line.contains('=') {
            for (key, value) in ratio_pairs(line) {
                match key.as_str() {
                    "quality" => cell.quality = Some(value),
                    "signal_level" => cell.signal_level = Some(value),
                    _ => {},
                }
            }
        }
    }

    cells.extend(current);
    cells
}

/// `"q/s"` for the cell named `ssid`, if the scan measured it.
#[must_use]
pub fn quality_for(output: &str, ssid: &str) -> Option<String> {
    parse_scan(output)
        .into_iter()
        .filter(|cell| cell.essid == ssid)
        .find_map(|cell| Some(format!("{}/{}", cell.quality?, cell.signal_level?)))
}

/// `Key Name=x/y` pairs on one line, keys lowercased with `_` for spaces.
fn ratio_pairs(line: &str) -> Vec<(String, f64)> {
    let mut pairs = Vec::new();
    let mut rest = line;

    while let Some((key, after)) = rest.split_once('=') {
        let value_len = after.find(char::is_whitespace).unwrap_or(after.len());
        let (value, tail) = after.split_at(value_len);

        let key = key.split("  ").last().unwrap_or(key).trim().to_lowercase().replace(' ', "_");
        if let Some(ratio) = parse_ratio(value) {
            pairs.push((key, ratio));
        }
        rest = tail;
    }
    pairs
}

fn parse_ratio(value: &str) -> Option<f64> {
    let (x, y) = value.split_once('/')?;
    let x: u32 = x.parse().ok()?;
    let y: u32 = y.parse().ok()?;
    (y != 0).then(|| f64::from(x) / f64::from(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAN: &str = r#"wlan0     Scan completed :
          Cell 01 - Address: 00:11:22:33:44:55
                    Channel:6
                    Frequency:2.437 GHz (Channel 6)
                    Quality=35/70  Signal level=55/100
                    Encryption key:on
                    ESSID:"ODONET_@"
          Cell 02 - Address: 66:77:88:99:AA:BB
                    Quality=70/70  Signal level=-38 dBm
                    ESSID:"ODONET_B"
"#;

    #[test]
    fn parses_cells() {
        let cells = parse_scan(SCAN);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].address, "00:11:22:33:44:55");
        assert_eq!(cells[0].essid, "ODONET_@");
        assert_eq!(cells[0].quality, Some(0.5));
        assert_eq!(cells[0].signal_level, Some(0.55));
        assert_eq!(cells[1].quality, Some(1.0));
        assert_eq!(cells[1].signal_level, None);
    }

    #[test]
    fn quality_for_parent() {
        assert_eq!(quality_for(SCAN, "ODONET_@").as_deref(), Some("0.5/0.55"));
        assert_eq!(quality_for(SCAN, "ODONET_B"), None);
        assert_eq!(quality_for(SCAN, "elsewhere"), None);
        assert_eq!(quality_for("", "ODONET_@"), None);
    }
}
