//! Routing profiles
//!
//! A profile classifies ways, assigns per-direction speeds, decides which
//! barriers can be passed and prices turns. The scripting environment of the
//! original system is out of scope; the `Profile` trait is the seam it would
//! plug into, and `CarProfile` is the built-in default.

use serde::{Deserialize, Serialize};

use crate::osm::Tags;
use crate::Weight;

/// Functional road classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RoadClass {
    Motorway = 0,
    Trunk = 1,
    Primary = 2,
    Secondary = 3,
    Tertiary = 4,
    Unclassified = 5,
    Residential = 6,
    LivingStreet = 7,
    Service = 8,
    Ramp = 9,
    Link = 10,
}

impl RoadClass {
    pub fn from_u8(v: u8) -> Option<Self> {
        use RoadClass::*;
        Some(match v {
            0 => Motorway,
            1 => Trunk,
            2 => Primary,
            3 => Secondary,
            4 => Tertiary,
            5 => Unclassified,
            6 => Residential,
            7 => LivingStreet,
            8 => Service,
            9 => Ramp,
            10 => Link,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TravelMode {
    Driving = 0,
    Cycling = 1,
    Walking = 2,
}

impl TravelMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => TravelMode::Driving,
            1 => TravelMode::Cycling,
            2 => TravelMode::Walking,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oneway {
    No,
    /// Traversable only in way direction.
    Forward,
    /// Traversable only against way direction.
    Reverse,
}

/// Result of assessing one way's tags.
#[derive(Debug, Clone)]
pub struct WayProfile {
    pub class: RoadClass,
    pub mode: TravelMode,
    /// km/h along the way direction; 0.0 means impassable.
    pub speed_forward_kmh: f64,
    /// km/h against the way direction; 0.0 means impassable.
    pub speed_backward_kmh: f64,
    pub roundabout: bool,
    /// `access=destination` and friends: usable but not for through traffic.
    pub access_restricted: bool,
    pub name: Option<String>,
}

impl WayProfile {
    pub fn oneway(&self) -> Oneway {
        match (self.speed_forward_kmh > 0.0, self.speed_backward_kmh > 0.0) {
            (true, false) => Oneway::Forward,
            (false, true) => Oneway::Reverse,
            _ => Oneway::No,
        }
    }
}

/// Coarse direction of a turn, mirrored between left and right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DirectionBucket {
    UTurn,
    SharpRight,
    Right,
    SlightRight,
    Straight,
    SlightLeft,
    Left,
    SharpLeft,
}

/// What kind of intersection a turn crosses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectionKind {
    Simple,
    Fork,
    Merge,
    Roundabout,
}

/// Additive turn price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnCost {
    pub weight: Weight,
    pub duration: Weight,
}

impl TurnCost {
    pub const ZERO: TurnCost = TurnCost {
        weight: 0,
        duration: 0,
    };
}

/// Everything the profile sees when pricing one turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext {
    /// Turn angle in degrees: 0 is a U-turn, 180 is straight through.
    pub angle: f64,
    pub bucket: DirectionBucket,
    pub kind: IntersectionKind,
    pub is_uturn: bool,
    /// The in-edge has no other admissible continuation.
    pub is_dead_end: bool,
    /// The turn continues the same road through a simple intersection.
    pub is_obvious_continuation: bool,
    pub has_traffic_signal: bool,
}

/// Profile-derived constants persisted into `.properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileProperties {
    pub profile_name: String,
    pub max_speed_kmh: f64,
    pub turn_penalty_ds: i32,
    pub traffic_signal_penalty_ds: i32,
    pub uturn_penalty_ds: i32,
    pub left_hand_driving: bool,
    /// Hop limit for the obvious-continuation look-ahead walk.
    pub continuation_hop_limit: u32,
    /// Alternative paths returned on top of the best route.
    pub alternative_count: u32,
}

/// The pluggable way/turn model.
pub trait Profile: Sync {
    fn name(&self) -> &str;

    /// Classify a way. `None` rejects it entirely.
    fn assess_way(&self, tags: &Tags) -> Option<WayProfile>;

    /// Whether this barrier kind lets traffic through.
    fn barrier_passable(&self, kind: &str, tags: &Tags) -> bool;

    /// Price a turn. Weights add onto the out-segment's traversal cost.
    fn turn_cost(&self, ctx: &TurnContext) -> TurnCost;

    fn properties(&self) -> ProfileProperties;
}

// ---------------------------------------------------------------------------
// Built-in car profile
// ---------------------------------------------------------------------------

/// Default motorcar profile with a sigmoid angle-to-penalty model.
pub struct CarProfile {
    /// Maximum angle-based turn penalty in deci-seconds.
    turn_penalty_ds: f64,
    /// >1.0 prefers right turns (right-hand traffic).
    turn_bias: f64,
    uturn_penalty_ds: i32,
    traffic_signal_penalty_ds: i32,
    left_hand_driving: bool,
}

impl Default for CarProfile {
    fn default() -> Self {
        Self {
            turn_penalty_ds: 75.0,
            turn_bias: 1.075,
            uturn_penalty_ds: 200,
            traffic_signal_penalty_ds: 20,
            left_hand_driving: false,
        }
    }
}

impl CarProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn left_hand_driving() -> Self {
        Self {
            left_hand_driving: true,
            ..Self::default()
        }
    }

    fn speed_for(highway: &str) -> Option<(RoadClass, f64)> {
        let entry = match highway {
            "motorway" => (RoadClass::Motorway, 90.0),
            "motorway_link" => (RoadClass::Ramp, 45.0),
            "trunk" => (RoadClass::Trunk, 85.0),
            "trunk_link" => (RoadClass::Link, 40.0),
            "primary" => (RoadClass::Primary, 65.0),
            "primary_link" => (RoadClass::Link, 30.0),
            "secondary" => (RoadClass::Secondary, 55.0),
            "secondary_link" => (RoadClass::Link, 25.0),
            "tertiary" => (RoadClass::Tertiary, 40.0),
            "tertiary_link" => (RoadClass::Link, 20.0),
            "unclassified" => (RoadClass::Unclassified, 25.0),
            "residential" => (RoadClass::Residential, 25.0),
            "living_street" => (RoadClass::LivingStreet, 10.0),
            "service" => (RoadClass::Service, 15.0),
            _ => return None,
        };
        Some(entry)
    }

    fn parse_maxspeed(value: &str) -> Option<f64> {
        let value = value.trim();
        if let Some(mph) = value.strip_suffix("mph") {
            return mph.trim().parse::<f64>().ok().map(|v| v * 1.609_344);
        }
        value.parse::<f64>().ok()
    }
}

impl Profile for CarProfile {
    fn name(&self) -> &str {
        "car"
    }

    fn assess_way(&self, tags: &Tags) -> Option<WayProfile> {
        let highway = tags.get("highway")?;
        let (class, mut speed) = Self::speed_for(highway)?;

        // Hard access bans
        for key in ["motor_vehicle", "vehicle", "access"] {
            match tags.get(key) {
                Some("no") | Some("private") | Some("agricultural") | Some("forestry") => {
                    return None;
                }
                _ => {}
            }
        }
        let access_restricted = matches!(
            tags.get("access").or_else(|| tags.get("motor_vehicle")),
            Some("destination") | Some("delivery") | Some("customers")
        );

        if let Some(max) = tags.get("maxspeed").and_then(Self::parse_maxspeed) {
            if max > 0.0 {
                speed = speed.min(max);
            }
        }

        let roundabout = matches!(tags.get("junction"), Some("roundabout") | Some("circular"));
        let oneway = match tags.get("oneway") {
            Some("yes") | Some("1") | Some("true") => Oneway::Forward,
            Some("-1") | Some("reverse") => Oneway::Reverse,
            Some("no") => Oneway::No,
            _ if roundabout => Oneway::Forward,
            _ => Oneway::No,
        };

        let (speed_forward_kmh, speed_backward_kmh) = match oneway {
            Oneway::No => (speed, speed),
            Oneway::Forward => (speed, 0.0),
            Oneway::Reverse => (0.0, speed),
        };

        Some(WayProfile {
            class,
            mode: TravelMode::Driving,
            speed_forward_kmh,
            speed_backward_kmh,
            roundabout,
            access_restricted,
            name: tags.get("name").map(str::to_owned),
        })
    }

    fn barrier_passable(&self, kind: &str, tags: &Tags) -> bool {
        match tags.get("access").or_else(|| tags.get("motor_vehicle")) {
            Some("yes") | Some("permissive") | Some("designated") => return true,
            Some("no") | Some("private") => return false,
            _ => {}
        }
        matches!(
            kind,
            "cattle_grid" | "border_control" | "toll_booth" | "sally_port" | "entrance" | "no"
        )
    }

    fn turn_cost(&self, ctx: &TurnContext) -> TurnCost {
        let mut penalty = 0i64;

        if ctx.is_uturn {
            penalty += self.uturn_penalty_ds as i64;
        } else if !ctx.is_obvious_continuation {
            // Deviation from straight, signed; positive toward the turn_bias side
            let mut deviation = ctx.angle - 180.0;
            if self.left_hand_driving {
                deviation = -deviation;
            }
            let exponent = -((13.0 / self.turn_bias) * (-deviation / 180.0) - 6.5 * self.turn_bias);
            let sigmoid = 1.0 / (1.0 + exponent.exp());
            penalty += (self.turn_penalty_ds * sigmoid).round() as i64;

            penalty += match ctx.kind {
                IntersectionKind::Fork => 10,
                IntersectionKind::Merge => 5,
                IntersectionKind::Roundabout => 5,
                IntersectionKind::Simple => 0,
            };
        }

        if ctx.has_traffic_signal {
            penalty += self.traffic_signal_penalty_ds as i64;
        }

        let penalty = penalty.min(i32::MAX as i64) as i32;
        TurnCost {
            weight: penalty,
            duration: penalty,
        }
    }

    fn properties(&self) -> ProfileProperties {
        ProfileProperties {
            profile_name: self.name().to_owned(),
            max_speed_kmh: 90.0,
            turn_penalty_ds: self.turn_penalty_ds as i32,
            traffic_signal_penalty_ds: self.traffic_signal_penalty_ds,
            uturn_penalty_ds: self.uturn_penalty_ds,
            left_hand_driving: self.left_hand_driving,
            continuation_hop_limit: 2,
            alternative_count: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn way(pairs: &[(&str, &str)]) -> Tags {
        let mut tags = Tags::new();
        for (k, v) in pairs {
            tags.insert(*k, *v);
        }
        tags
    }

    #[test]
    fn residential_way_is_bidirectional() {
        let p = CarProfile::new();
        let w = p.assess_way(&way(&[("highway", "residential")])).unwrap();
        assert_eq!(w.class, RoadClass::Residential);
        assert_eq!(w.oneway(), Oneway::No);
        assert!(w.speed_forward_kmh > 0.0 && w.speed_backward_kmh > 0.0);
    }

    #[test]
    fn footway_is_rejected() {
        let p = CarProfile::new();
        assert!(p.assess_way(&way(&[("highway", "footway")])).is_none());
        assert!(p
            .assess_way(&way(&[("highway", "primary"), ("access", "no")]))
            .is_none());
    }

    #[test]
    fn oneway_and_roundabout() {
        let p = CarProfile::new();
        let w = p
            .assess_way(&way(&[("highway", "primary"), ("oneway", "yes")]))
            .unwrap();
        assert_eq!(w.oneway(), Oneway::Forward);

        let r = p
            .assess_way(&way(&[("highway", "primary"), ("junction", "roundabout")]))
            .unwrap();
        assert!(r.roundabout);
        assert_eq!(r.oneway(), Oneway::Forward);
    }

    #[test]
    fn maxspeed_caps_class_speed() {
        let p = CarProfile::new();
        let w = p
            .assess_way(&way(&[("highway", "primary"), ("maxspeed", "30")]))
            .unwrap();
        assert_eq!(w.speed_forward_kmh, 30.0);
        let mph = p
            .assess_way(&way(&[("highway", "primary"), ("maxspeed", "20 mph")]))
            .unwrap();
        assert!((mph.speed_forward_kmh - 32.19).abs() < 0.01);
    }

    #[test]
    fn left_turns_cost_more_than_right_turns() {
        let p = CarProfile::new();
        let base = TurnContext {
            angle: 180.0,
            bucket: DirectionBucket::Straight,
            kind: IntersectionKind::Simple,
            is_uturn: false,
            is_dead_end: false,
            is_obvious_continuation: false,
            has_traffic_signal: false,
        };
        // Right turn: angle 270, left turn: angle 90 (0 = U-turn, 180 = straight)
        let right = p.turn_cost(&TurnContext {
            angle: 270.0,
            bucket: DirectionBucket::Right,
            ..base
        });
        let left = p.turn_cost(&TurnContext {
            angle: 90.0,
            bucket: DirectionBucket::Left,
            ..base
        });
        assert!(
            left.weight > right.weight,
            "left {} <= right {}",
            left.weight,
            right.weight
        );
    }

    #[test]
    fn uturn_penalty_dominates() {
        let p = CarProfile::new();
        let cost = p.turn_cost(&TurnContext {
            angle: 2.0,
            bucket: DirectionBucket::UTurn,
            kind: IntersectionKind::Simple,
            is_uturn: true,
            is_dead_end: true,
            is_obvious_continuation: false,
            has_traffic_signal: false,
        });
        assert_eq!(cost.weight, 200);
    }

    #[test]
    fn obvious_continuation_is_free_except_signals() {
        let p = CarProfile::new();
        let ctx = TurnContext {
            angle: 178.0,
            bucket: DirectionBucket::Straight,
            kind: IntersectionKind::Simple,
            is_uturn: false,
            is_dead_end: false,
            is_obvious_continuation: true,
            has_traffic_signal: false,
        };
        assert_eq!(p.turn_cost(&ctx), TurnCost::ZERO);
        let signal = p.turn_cost(&TurnContext {
            has_traffic_signal: true,
            ..ctx
        });
        assert_eq!(signal.weight, 20);
    }
}
