use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read a whole sysfs attribute with trailing whitespace trimmed.
pub fn read_attribute(file: &Path) -> io::Result<String> {
    let mut reader = String::with_capacity(64);
    File::open(file)?.read_to_string(&mut reader)?;
    reader.truncate(reader.trim_end().len());
    Ok(reader)
}

/// Read a single number from a sysfs attribute, e.g. `temperature` or `vad`.
pub fn read_number<N>(file: &Path) -> Option<N>
where
    N: std::str::FromStr,
{
    let mut reader = [0u8; 32];
    let mut f = File::open(file).ok()?;
    let n = f.read(&mut reader).ok()?;
    // parse and trim would complain about `\0`.
    let number = std::str::from_utf8(&reader[..n]).ok()?;
    number.trim_matches(|c: char| c.is_whitespace() || c == '\0').parse().ok()
}

/// Convert milli-units as reported by w1 slave drivers.
#[inline]
pub fn from_milli(value: i32) -> f32 {
    value as f32 / 1000f32
}
