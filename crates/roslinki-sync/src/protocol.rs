//! # Topic Layout
//!
//! MQTT topics shared by the gateway and the field controllers.
//!
//! ```text
//! field ──► <prefix>/sensor_logs   {deviceId|plant_id, value, timestamp?}
//! field ──► <prefix>/pump_logs     {deviceId|plant_id, action, timestamp?}
//! field ◄── <prefix>/config        FullStateSnapshot (retained)
//! ```

/// Kind of inbound telemetry, derived from the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    SensorLog,
    PumpLog,
}

/// Fully qualified topic names for one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub sensor_logs: String,
    pub pump_logs: String,
    pub config: String,
}

impl Topics {
    pub fn new(prefix: &str) -> Self {
        Topics {
            sensor_logs: format!("{}/sensor_logs", prefix),
            pump_logs: format!("{}/pump_logs", prefix),
            config: format!("{}/config", prefix),
        }
    }

    /// Topics the gateway subscribes to.
    pub fn inbound(&self) -> [&str; 2] {
        [&self.sensor_logs, &self.pump_logs]
    }

    /// Maps a received topic to its kind, `None` for anything else.
    pub fn classify(&self, topic: &str) -> Option<InboundKind> {
        if topic == self.sensor_logs {
            Some(InboundKind::SensorLog)
        } else if topic == self.pump_logs {
            Some(InboundKind::PumpLog)
        } else {
            None
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Topics::new("roslinki")
    }
}
