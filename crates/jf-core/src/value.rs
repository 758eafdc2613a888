//! Signal values carried by ports.
//!
//! Every port holds one value from a closed set of types. The set covers what
//! control systems exchange: scalars, Cartesian 3-vectors (forces, positions),
//! joint-space vectors sized by the robot's degrees of freedom, matrices
//! (Jacobians, gains) and rigid poses.

use core::fmt;

use nalgebra::{DMatrix, DVector, Isometry3, Vector3};

/// Coarse kind of a value, known statically for every Rust type that can
/// travel through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    Scalar,
    Vector3,
    Joints,
    Matrix,
    Pose,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Scalar => "scalar",
            ValueKind::Vector3 => "vector3",
            ValueKind::Joints => "joints",
            ValueKind::Matrix => "matrix",
            ValueKind::Pose => "pose",
        };
        f.write_str(name)
    }
}

/// Full type tag of a port, including dimensions.
///
/// Two ports may be connected only if their tags are equal: a 7-DOF joint
/// vector does not connect to a 4-DOF one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueType {
    Scalar,
    Vector3,
    Joints { dof: usize },
    Matrix { rows: usize, cols: usize },
    Pose,
}

impl ValueType {
    pub fn kind(&self) -> ValueKind {
        match self {
            ValueType::Scalar => ValueKind::Scalar,
            ValueType::Vector3 => ValueKind::Vector3,
            ValueType::Joints { .. } => ValueKind::Joints,
            ValueType::Matrix { .. } => ValueKind::Matrix,
            ValueType::Pose => ValueKind::Pose,
        }
    }

    /// Degrees of freedom of a joint-space type.
    pub fn dof(&self) -> Option<usize> {
        match self {
            ValueType::Joints { dof } => Some(*dof),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Joints { dof } => write!(f, "joints[{dof}]"),
            ValueType::Matrix { rows, cols } => write!(f, "matrix[{rows}x{cols}]"),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// A concrete signal value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Scalar(f64),
    Vector3(Vector3<f64>),
    Joints(DVector<f64>),
    Matrix(DMatrix<f64>),
    Pose(Isometry3<f64>),
}

impl Value {
    /// Type tag of this value, with its actual dimensions.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Scalar(_) => ValueType::Scalar,
            Value::Vector3(_) => ValueType::Vector3,
            Value::Joints(v) => ValueType::Joints { dof: v.len() },
            Value::Matrix(m) => ValueType::Matrix {
                rows: m.nrows(),
                cols: m.ncols(),
            },
            Value::Pose(_) => ValueType::Pose,
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.value_type().kind()
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Typed view of the value.
    pub fn get<T: PortValue>(&self) -> Option<&T> {
        T::from_value(self)
    }

    /// All-zero value of `value_type`; poses start at the identity.
    pub fn zeros(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Scalar => Value::Scalar(0.0),
            ValueType::Vector3 => Value::Vector3(Vector3::zeros()),
            ValueType::Joints { dof } => Value::Joints(DVector::zeros(dof)),
            ValueType::Matrix { rows, cols } => Value::Matrix(DMatrix::zeros(rows, cols)),
            ValueType::Pose => Value::Pose(Isometry3::identity()),
        }
    }

    /// Overwrite with `src`. Storage is reused when both sides have the same
    /// type and dimensions, so steady-state copies never allocate.
    pub fn assign(&mut self, src: &Value) {
        match (self, src) {
            (Value::Joints(dst), Value::Joints(src)) if dst.len() == src.len() => dst.copy_from(src),
            (Value::Matrix(dst), Value::Matrix(src)) if dst.shape() == src.shape() => {
                dst.copy_from(src)
            }
            (dst, src) => *dst = src.clone(),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(value)
    }
}

/// Rust types that can travel through a port.
///
/// `KIND` lets typed port handles be checked against a port's declared
/// `ValueType` when they are looked up by name.
pub trait PortValue: Clone + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<&Self>;

    fn from_value_mut(value: &mut Value) -> Option<&mut Self>;

    /// Copy `self` into `dst`, reusing `dst`'s storage when the dimensions
    /// agree.
    fn copy_to(&self, dst: &mut Self) {
        dst.clone_from(self);
    }
}

macro_rules! port_value {
    ($ty:ty, $variant:ident) => {
        port_value!($ty, $variant, {});
    };
    ($ty:ty, $variant:ident, { $($copy:tt)* }) => {
        impl PortValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<&Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_value_mut(value: &mut Value) -> Option<&mut Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            $($copy)*
        }
    };
}

port_value!(f64, Scalar);
port_value!(Vector3<f64>, Vector3);
port_value!(Isometry3<f64>, Pose);
port_value!(DVector<f64>, Joints, {
    fn copy_to(&self, dst: &mut Self) {
        if dst.len() == self.len() {
            dst.copy_from(self);
        } else {
            *dst = self.clone();
        }
    }
});
port_value!(DMatrix<f64>, Matrix, {
    fn copy_to(&self, dst: &mut Self) {
        if dst.shape() == self.shape() {
            dst.copy_from(self);
        } else {
            *dst = self.clone();
        }
    }
});
