use regex::Regex;
use std::sync::OnceLock;

/// Maximum number of breakpoints kept from a configuration string.
pub const MAX_BONDS: usize = 20;

/// One `raw=display` breakpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    pub sensor_value: f32,
    pub display_value: f32,
}

/// Ordered breakpoint table for non-linear scaling, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bonds(Vec<Bond>);

impl Bonds {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bond> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Bond] {
        &self.0
    }

    /// Linear interpolation over adjacent breakpoints.
    ///
    /// Segments are formed by neighbouring pairs in input order and the first
    /// segment whose raw range contains `raw` wins. Returns `None` with fewer
    /// than two breakpoints or when `raw` lies on no segment.
    pub fn interpolate(&self, raw: f32) -> Option<f32> {
        self.0.windows(2).find_map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            let (lo, hi) = if a.sensor_value <= b.sensor_value {
                (a.sensor_value, b.sensor_value)
            } else {
                (b.sensor_value, a.sensor_value)
            };
            if raw < lo || raw > hi {
                return None;
            }
            if a.sensor_value == b.sensor_value {
                return Some(a.display_value);
            }
            let ratio = (raw - a.sensor_value) / (b.sensor_value - a.sensor_value);
            Some(a.display_value + ratio * (b.display_value - a.display_value))
        })
    }
}

impl<'a> IntoIterator for &'a Bonds {
    type Item = &'a Bond;
    type IntoIter = std::slice::Iter<'a, Bond>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Parse `raw=display` pairs separated by `;`.
///
/// Pairs without `=` are skipped, a final pair needs no trailing separator and
/// anything after the 20th pair is ignored. Numbers are read leniently: the
/// longest numeric prefix is used and text without one reads as `0`.
pub fn parse_value_pairs(input: &str) -> Bonds {
    let bonds = input
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .take(MAX_BONDS)
        .map(|(raw, display)| Bond {
            sensor_value: leading_float(raw),
            display_value: leading_float(display),
        })
        .collect();
    Bonds(bonds)
}

fn leading_float(text: &str) -> f32 {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| {
        Regex::new(r"^\s*[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("valid number pattern")
    });
    re.find(text)
        .and_then(|m| m.as_str().trim().parse::<f32>().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(bonds: &Bonds) -> Vec<(f32, f32)> {
        bonds
            .iter()
            .map(|b| (b.sensor_value, b.display_value))
            .collect()
    }

    #[test]
    fn test_parse_keeps_input_order() {
        let bonds = parse_value_pairs("0=0;1=50;2=100;10=200");
        assert_eq!(
            pairs(&bonds),
            vec![(0.0, 0.0), (1.0, 50.0), (2.0, 100.0), (10.0, 200.0)]
        );
    }

    #[test]
    fn test_parse_decimal_pairs() {
        let bonds = parse_value_pairs("111.111=111.222;222.222=222.111;333.333=333.111");
        assert_eq!(bonds.len(), 3);
        assert_eq!(bonds.as_slice()[0].sensor_value, 111.111);
        assert_eq!(bonds.as_slice()[0].display_value, 111.222);
    }

    #[test]
    fn test_parse_trailing_separator_and_junk() {
        let bonds = parse_value_pairs("1=2;nonsense;3=4;");
        assert_eq!(pairs(&bonds), vec![(1.0, 2.0), (3.0, 4.0)]);

        let bonds = parse_value_pairs("x=5;2.5abc=7");
        assert_eq!(pairs(&bonds), vec![(0.0, 5.0), (2.5, 7.0)]);

        assert!(parse_value_pairs("").is_empty());
    }

    #[test]
    fn test_parse_caps_at_twenty_pairs() {
        let input: Vec<String> = (0..25).map(|i| format!("{}={}", i, i * 10)).collect();
        let bonds = parse_value_pairs(&input.join(";"));
        assert_eq!(bonds.len(), MAX_BONDS);
        assert_eq!(bonds.as_slice()[19].sensor_value, 19.0);
    }

    #[test]
    fn test_interpolate_between_breakpoints() {
        let bonds = parse_value_pairs("0=0;1=50;2=100;10=200");
        assert_eq!(bonds.interpolate(0.5), Some(25.0));
        assert_eq!(bonds.interpolate(2.0), Some(100.0));
        assert_eq!(bonds.interpolate(6.0), Some(150.0));
        assert_eq!(bonds.interpolate(10.0), Some(200.0));
    }

    #[test]
    fn test_interpolate_outside_table() {
        let bonds = parse_value_pairs("0=0;1=50;2=100;10=200");
        assert_eq!(bonds.interpolate(-0.5), None);
        assert_eq!(bonds.interpolate(10.5), None);

        assert_eq!(parse_value_pairs("1=50").interpolate(1.0), None);
    }

    #[test]
    fn test_interpolate_descending_table() {
        let bonds = parse_value_pairs("3=0;0=120");
        assert_eq!(bonds.interpolate(1.5), Some(60.0));
    }
}
