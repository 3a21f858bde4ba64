//! Device argument strings.
//!
//! Devices are selected with a comma-separated `key=value` list, the same
//! form SoapySDR accepts (`driver=lime,serial=0009060B00471B22`). The
//! `driver=sim` key selects the simulated loopback.

use std::fmt;

/// Parsed `key=value` device arguments, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceArgs {
    pairs: Vec<(String, String)>,
}

impl DeviceArgs {
    /// Parse an argument string. Empty items are skipped; a bare key maps
    /// to an empty value.
    ///
    /// # Example
    ///
    /// ```
    /// use adapter_device::DeviceArgs;
    ///
    /// let args = DeviceArgs::parse("driver=sim, seed=7");
    /// assert_eq!(args.driver(), Some("sim"));
    /// assert_eq!(args.get("seed"), Some("7"));
    /// assert_eq!(args.to_string(), "driver=sim,seed=7");
    /// ```
    pub fn parse(input: &str) -> Self {
        let pairs = input
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| match item.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
                None => (item.to_string(), String::new()),
            })
            .collect();
        Self { pairs }
    }

    /// Value for `key`, if present. The last occurrence wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the `driver` key.
    pub fn driver(&self) -> Option<&str> {
        self.get("driver")
    }

    /// Whether the simulated loopback was requested.
    pub fn is_simulated(&self) -> bool {
        self.driver() == Some("sim")
    }

    /// Whether no arguments were given.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for DeviceArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if v.is_empty() {
                write!(f, "{k}")?;
            } else {
                write!(f, "{k}={v}")?;
            }
        }
        Ok(())
    }
}
