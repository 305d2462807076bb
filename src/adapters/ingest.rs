//! Sensor ingestion: transport messages decoded into environment observations.
//!
//! Messages arrive as a type name plus a JSON payload. Which names are
//! understood is decided by the message-type table in [`crate::registry`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::*;
use crate::environment::SharedEnvironment;

/// Decoder from a JSON payload to an observation
pub type DecodeFn = fn(&Value) -> Result<Observation, ObservationError>;

/// One supported transport message type.
#[derive(Debug, Clone, Copy)]
pub struct MessageType {
    pub name: &'static str,
    /// [`Observation::kind`] produced by `decode`
    pub observation_kind: &'static str,
    pub decode: DecodeFn,
}

/// Raw transport message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub type_name: String,
    pub payload: Value,
}

impl RawMessage {
    pub fn new(type_name: &str, payload: Value) -> Self {
        Self {
            type_name: type_name.to_string(),
            payload,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PoseMsg {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    yaw: f64,
}

#[derive(Debug, Deserialize)]
struct LaserScanMsg {
    /// Sensor pose in the map frame
    #[serde(default)]
    origin: PoseMsg,
    angle_min: f64,
    angle_increment: f64,
    range_min: f64,
    range_max: f64,
    /// `null` marks a ray without return
    ranges: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct PolygonMsg {
    points: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct PolygonArrayMsg {
    polygons: Vec<PolygonMsg>,
}

fn parse<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, ObservationError> {
    T::deserialize(payload).map_err(|e| ObservationError::Decode(e.to_string()))
}

/// `sensor_msgs/LaserScan`
pub fn decode_laser_scan(payload: &Value) -> Result<Observation, ObservationError> {
    let msg: LaserScanMsg = parse(payload)?;
    Ok(Observation::Scan(LaserScan {
        origin: RobotState::with_yaw(Point::new(msg.origin.x, msg.origin.y), msg.origin.yaw),
        angle_min: msg.angle_min,
        angle_increment: msg.angle_increment,
        range_min: msg.range_min,
        range_max: msg.range_max,
        ranges: msg.ranges.into_iter().map(|r| r.unwrap_or(f64::INFINITY)).collect(),
    }))
}

/// `geometry_msgs/PolygonArray`
pub fn decode_polygon_array(payload: &Value) -> Result<Observation, ObservationError> {
    let msg: PolygonArrayMsg = parse(payload)?;
    Ok(Observation::Polygons(
        msg.polygons.into_iter().map(|p| Polygon::new(p.points)).collect(),
    ))
}

/// Inverse of [`decode_laser_scan`]; rays without return become `null`.
pub fn encode_laser_scan(scan: &LaserScan) -> Value {
    serde_json::json!({
        "origin": {
            "x": scan.origin.position.x,
            "y": scan.origin.position.y,
            "yaw": scan.origin.yaw.unwrap_or(0.0),
        },
        "angle_min": scan.angle_min,
        "angle_increment": scan.angle_increment,
        "range_min": scan.range_min,
        "range_max": scan.range_max,
        "ranges": scan
            .ranges
            .iter()
            .map(|r| if r.is_finite() { Some(*r) } else { None })
            .collect::<Vec<_>>(),
    })
}

/// Inverse of [`decode_polygon_array`].
pub fn encode_polygon_array(polygons: &[Polygon]) -> Value {
    serde_json::json!({
        "polygons": polygons
            .iter()
            .map(|p| serde_json::json!({ "points": p.vertices }))
            .collect::<Vec<_>>(),
    })
}

/// Decodes incoming messages of one configured type into the shared environment.
#[derive(Clone)]
pub struct SensorIngest {
    env: SharedEnvironment,
    message_type: MessageType,
}

impl SensorIngest {
    pub fn new(env: SharedEnvironment, message_type: MessageType) -> Self {
        Self { env, message_type }
    }

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    /// Never fails: undecodable messages are dropped and counted by the environment.
    pub fn ingest(&self, message: &RawMessage) {
        if message.type_name != self.message_type.name {
            self.env
                .drop_observation(&ObservationError::UnknownMessageType(message.type_name.clone()));
            return;
        }
        match (self.message_type.decode)(&message.payload) {
            Ok(observation) => self.env.update(&observation),
            Err(e) => self.env.drop_observation(&e),
        }
    }
}
