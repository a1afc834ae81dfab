use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;

// ════════════════════════════════════════════════════════════════
//  Field
// ════════════════════════════════════════════════════════════════

macro_rules! define_fields {
    ($( $variant:ident => $label:literal, $unit:literal; )+) => {
        /// One column of an OpenRocket flight-simulation export.
        ///
        /// Serialized by its wire label, so configuration files can name
        /// fields exactly as they appear on the wire.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Field {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl Field {
            /// All fields, in export column order.
            pub const ALL: &'static [Field] = &[$(Field::$variant,)+];

            pub const COUNT: usize = Self::ALL.len();

            /// Label used in the log header and on the wire.
            pub fn label(self) -> &'static str {
                match self {
                    $(Field::$variant => $label,)+
                }
            }

            /// Unit of the column, `"?"` for dimensionless values.
            pub fn unit(self) -> &'static str {
                match self {
                    $(Field::$variant => $unit,)+
                }
            }
        }
    };
}

define_fields! {
    Time => "Time", "s";
    Altitude => "Altitude", "m";
    VerticalVelocity => "Vertical velocity", "m/s";
    VerticalAcceleration => "Vertical acceleration", "m/s^2";
    TotalVelocity => "Total velocity", "m/s";
    TotalAcceleration => "Total acceleration", "m/s^2";
    PositionEast => "Position East of launch", "m";
    PositionNorth => "Position North of launch", "m";
    LateralDistance => "Lateral distance", "m";
    LateralDirection => "Lateral direction", "deg";
    LateralVelocity => "Lateral velocity", "m/s";
    LateralAcceleration => "Lateral acceleration", "m/s^2";
    Latitude => "Latitude", "deg";
    Longitude => "Longitude", "deg";
    GravitationalAcceleration => "Gravitational acceleration", "m/s^2";
    AngleOfAttack => "Angle of attack", "deg";
    RollRate => "Roll rate", "deg/s";
    PitchRate => "Pitch rate", "deg/s";
    YawRate => "Yaw rate", "deg/s";
    Mass => "Mass", "g";
    PropellantMass => "Propellant mass", "g";
    LongitudinalInertia => "Longitudinal moment of inertia", "kg*m^2";
    RotationalInertia => "Rotational moment of inertia", "kg*m^2";
    CpLocation => "CP location", "cm";
    CgLocation => "CG location", "cm";
    StabilityMargin => "Stability margin calibers", "?";
    MachNumber => "Mach number", "?";
    ReynoldsNumber => "Reynolds number", "?";
    Thrust => "Thrust", "N";
    DragForce => "Drag force", "N";
    DragCoefficient => "Drag coefficient", "?";
    AxialDragCoefficient => "Axial drag coefficient", "?";
    FrictionDragCoefficient => "Friction drag coefficient", "?";
    PressureDragCoefficient => "Pressure drag coefficient", "?";
    BaseDragCoefficient => "Base drag coefficient", "?";
    NormalForceCoefficient => "Normal force coefficient", "?";
    PitchMomentCoefficient => "Pitch moment coefficient", "?";
    YawMomentCoefficient => "Yaw moment coefficient", "?";
    SideForceCoefficient => "Side force coefficient", "?";
    RollMomentCoefficient => "Roll moment coefficient", "?";
    RollForcingCoefficient => "Roll forcing coefficient", "?";
    RollDampingCoefficient => "Roll damping coefficient", "?";
    PitchDampingCoefficient => "Pitch damping coefficient", "?";
    CoriolisAcceleration => "Coriolis acceleration", "m/s^2";
    ReferenceLength => "Reference length", "cm";
    ReferenceArea => "Reference area", "cm^2";
    VerticalOrientation => "Vertical orientation (zenith)", "deg";
    LateralOrientation => "Lateral orientation (azimuth)", "deg";
    WindVelocity => "Wind velocity", "m/s";
    AirTemperature => "Air temperature", "deg C";
    AirPressure => "Air pressure", "mbar";
    SpeedOfSound => "Speed of sound", "m/s";
    SimulationTimeStep => "Simulation time step", "s";
    ComputationTime => "Computation time", "s";
}

impl Field {
    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Field {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.label() == s)
            .ok_or_else(|| RecordError::UnknownField(s.to_string()))
    }
}

// ════════════════════════════════════════════════════════════════
//  Field Schema
// ════════════════════════════════════════════════════════════════

/// Ordered column layout of a log. Position determines column mapping.
///
/// Built once at startup and shared read-only; clones share the same
/// allocation.
#[derive(Clone)]
pub struct FieldSchema {
    inner: Arc<SchemaInner>,
}

struct SchemaInner {
    fields: Vec<Field>,
    /// Field → column position, `None` for fields outside the schema.
    positions: [Option<usize>; Field::COUNT],
    time_position: usize,
}

impl FieldSchema {
    /// Custom column layout. Fails on duplicates or when `Time` is absent.
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Result<Self, RecordError> {
        let fields: Vec<Field> = fields.into_iter().collect();
        let mut positions = [None; Field::COUNT];

        for (pos, field) in fields.iter().enumerate() {
            let slot = &mut positions[field.index()];
            if slot.is_some() {
                return Err(RecordError::Schema(format!("duplicate field '{field}'")));
            }
            *slot = Some(pos);
        }

        let time_position = positions[Field::Time.index()]
            .ok_or_else(|| RecordError::Schema(format!("schema has no '{}' field", Field::Time)))?;

        Ok(Self {
            inner: Arc::new(SchemaInner { fields, positions, time_position }),
        })
    }

    /// Full OpenRocket export layout (every `Field`, in column order).
    pub fn openrocket() -> Self {
        let mut positions = [None; Field::COUNT];
        for (pos, field) in Field::ALL.iter().enumerate() {
            positions[field.index()] = Some(pos);
        }
        Self {
            inner: Arc::new(SchemaInner {
                fields: Field::ALL.to_vec(),
                positions,
                time_position: Field::Time.index(),
            }),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.inner.fields
    }

    pub fn len(&self) -> usize {
        self.inner.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.is_empty()
    }

    /// Column position of `field`, if the schema contains it.
    pub fn position(&self, field: Field) -> Option<usize> {
        self.inner.positions[field.index()]
    }

    pub fn contains(&self, field: Field) -> bool {
        self.position(field).is_some()
    }

    pub fn time_position(&self) -> usize {
        self.inner.time_position
    }
}

impl PartialEq for FieldSchema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.fields == other.inner.fields
    }
}

impl Eq for FieldSchema {}

impl std::fmt::Debug for FieldSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.inner.fields.iter()).finish()
    }
}

// ════════════════════════════════════════════════════════════════
//  Selection
// ════════════════════════════════════════════════════════════════

/// Ordered list of fields chosen for transmission.
///
/// Validated against a schema once, so encoding a record of that schema
/// never hits a missing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    fields: Vec<Field>,
}

impl Selection {
    /// Fields the visualization client consumes.
    pub const TELEMETRY: [Field; 3] = [Field::Time, Field::SimulationTimeStep, Field::ComputationTime];

    pub fn new(fields: impl IntoIterator<Item = Field>, schema: &FieldSchema) -> Result<Self, RecordError> {
        let fields: Vec<Field> = fields.into_iter().collect();
        if fields.is_empty() {
            return Err(RecordError::Schema("selection is empty".into()));
        }
        for (i, field) in fields.iter().enumerate() {
            if !schema.contains(*field) {
                return Err(RecordError::Schema(format!("selected field '{field}' is not in the schema")));
            }
            if fields[..i].contains(field) {
                return Err(RecordError::Schema(format!("field '{field}' selected twice")));
            }
        }
        Ok(Self { fields })
    }

    /// Every schema field, in schema order.
    pub fn all(schema: &FieldSchema) -> Self {
        Self { fields: schema.fields().to_vec() }
    }

    /// `Time`, `Simulation time step`, `Computation time`.
    pub fn telemetry(schema: &FieldSchema) -> Result<Self, RecordError> {
        Self::new(Self::TELEMETRY, schema)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
