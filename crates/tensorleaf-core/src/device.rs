use std::fmt;

use crate::error::{Error, Result};

// DeviceId: where a buffer lives
//
// Configuration records name devices by integer the way training scripts do:
// a negative id means the host CPU, and n >= 0 means accelerator n.
// Buffers in this crate are always materialized in host memory; the device id
// records which location the buffer is logically resident on, so that
// "move to CPU, draw random numbers, move back" sequences stay observable and
// ordered.

/// Identifies the location of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceId {
    /// Host memory.
    #[default]
    Cpu,
    /// Accelerator with the given ordinal.
    Gpu(usize),
}

impl DeviceId {
    /// Interpret a configuration integer (negative = CPU).
    pub fn from_config_id(id: i64) -> Self {
        if id < 0 {
            DeviceId::Cpu
        } else {
            DeviceId::Gpu(id as usize)
        }
    }

    /// The configuration integer for this device.
    pub fn to_config_id(self) -> i64 {
        match self {
            DeviceId::Cpu => -1,
            DeviceId::Gpu(n) => n as i64,
        }
    }

    /// A human-readable name for this device (e.g., "cpu", "gpu:0").
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Parse "cpu", "gpu:N" or a bare integer.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("cpu") {
            return Ok(DeviceId::Cpu);
        }
        if let Some(n) = s.strip_prefix("gpu:") {
            return n
                .parse::<usize>()
                .map(DeviceId::Gpu)
                .map_err(|e| Error::invalid_argument(format!("bad device '{s}': {e}")));
        }
        s.parse::<i64>()
            .map(DeviceId::from_config_id)
            .map_err(|_| Error::invalid_argument(format!("bad device '{s}'")))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Cpu => write!(f, "cpu"),
            DeviceId::Gpu(n) => write!(f, "gpu:{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_ids() {
        assert_eq!(DeviceId::from_config_id(-1), DeviceId::Cpu);
        assert_eq!(DeviceId::from_config_id(2), DeviceId::Gpu(2));
        assert_eq!(DeviceId::Gpu(3).to_config_id(), 3);
        assert_eq!(DeviceId::Cpu.to_config_id(), -1);
    }

    #[test]
    fn test_parse() {
        assert_eq!(DeviceId::parse("CPU").unwrap(), DeviceId::Cpu);
        assert_eq!(DeviceId::parse("gpu:1").unwrap(), DeviceId::Gpu(1));
        assert_eq!(DeviceId::parse("-1").unwrap(), DeviceId::Cpu);
        assert!(DeviceId::parse("tpu").is_err());
    }
}
