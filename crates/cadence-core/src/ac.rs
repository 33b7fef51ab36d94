//! AC space: named variables exchanged between stages of one chain.
//!
//! A stage declares a variable (usually while preparing), binds a new value
//! to it once per cycle, and any stage at or after it in chain order reads
//! it. Reading a variable declared by a later stage is a wiring error, which
//! keeps the data flow acyclic.
//!
//! All buffers are allocated at declaration time. Binding copies into the
//! existing buffer and reading borrows it, so steady-state cycles neither
//! allocate nor free. Errors allocate their message strings, but only on the
//! failing (fatal) path.
//!
//! ```rust
//! use cadence_core::{AcSpace, AcValue, Persistence};
//!
//! let mut ac = AcSpace::new();
//! ac.register_stage(0, "meter");
//! ac.register_stage(1, "gain");
//!
//! ac.enter(0);
//! ac.declare("level", AcValue::Float(0.0), Persistence::Transient).unwrap();
//!
//! ac.begin_cycle();
//! ac.enter(0);
//! ac.bind_float("level", 0.25).unwrap();
//! ac.enter(1);
//! assert_eq!(ac.get_float("level").unwrap(), 0.25);
//! ```

use core::fmt;
use std::collections::HashMap;

use crate::error::AcError;
use crate::fragment::Complex32;

/// Value type of an AC variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcType {
    /// Scalar integer.
    Int,
    /// Scalar real.
    Float,
    /// Vector of reals.
    Vector,
    /// Matrix of reals, row-major.
    Matrix,
    /// Matrix of complex values, row-major.
    Complex,
}

impl fmt::Display for AcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcType::Int => "int",
            AcType::Float => "float",
            AcType::Vector => "vector",
            AcType::Matrix => "matrix",
            AcType::Complex => "complex matrix",
        };
        f.write_str(name)
    }
}

/// Whether a value outlives the cycle it was bound in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Readable only in the cycle it was bound in.
    Transient,
    /// Readable until overwritten; the declared value counts as bound.
    Persistent,
}

/// Initial value (and therefore type and shape) of a declared variable.
#[derive(Debug, Clone, PartialEq)]
pub enum AcValue {
    /// Scalar integer.
    Int(i64),
    /// Scalar real.
    Float(f32),
    /// Vector of reals.
    Vector(Vec<f32>),
    /// Row-major real matrix.
    Matrix {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
        /// `rows × cols` elements.
        data: Vec<f32>,
    },
    /// Row-major complex matrix.
    Complex {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
        /// `rows × cols` elements.
        data: Vec<Complex32>,
    },
}

impl AcValue {
    /// Zeroed vector of `len` elements.
    pub fn vector(len: usize) -> Self {
        AcValue::Vector(vec![0.0; len])
    }

    /// Zeroed `rows × cols` real matrix.
    pub fn matrix(rows: usize, cols: usize) -> Self {
        AcValue::Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Zeroed `rows × cols` complex matrix.
    pub fn complex(rows: usize, cols: usize) -> Self {
        AcValue::Complex {
            rows,
            cols,
            data: vec![Complex32::new(0.0, 0.0); rows * cols],
        }
    }

    /// Type tag.
    pub fn ac_type(&self) -> AcType {
        match self {
            AcValue::Int(_) => AcType::Int,
            AcValue::Float(_) => AcType::Float,
            AcValue::Vector(_) => AcType::Vector,
            AcValue::Matrix { .. } => AcType::Matrix,
            AcValue::Complex { .. } => AcType::Complex,
        }
    }

    fn shape(&self) -> (usize, usize) {
        match self {
            AcValue::Int(_) | AcValue::Float(_) => (1, 1),
            AcValue::Vector(v) => (1, v.len()),
            AcValue::Matrix { rows, cols, .. } | AcValue::Complex { rows, cols, .. } => {
                (*rows, *cols)
            }
        }
    }

    fn is_consistent(&self) -> bool {
        match self {
            AcValue::Matrix { rows, cols, data } => data.len() == rows * cols,
            AcValue::Complex { rows, cols, data } => data.len() == rows * cols,
            _ => true,
        }
    }
}

/// Borrowed view of a matrix variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixView<'a, T> {
    /// Row count.
    pub rows: usize,
    /// Column count.
    pub cols: usize,
    /// Row-major elements.
    pub data: &'a [T],
}

impl<'a, T> MatrixView<'a, T> {
    /// One row.
    pub fn row(&self, row: usize) -> &'a [T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }
}

/// Borrowed view of any variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcView<'a> {
    /// Scalar integer.
    Int(i64),
    /// Scalar real.
    Float(f32),
    /// Vector of reals.
    Vector(&'a [f32]),
    /// Real matrix.
    Matrix(MatrixView<'a, f32>),
    /// Complex matrix.
    Complex(MatrixView<'a, Complex32>),
}

/// Description of a declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcInfo {
    /// Variable name.
    pub name: String,
    /// Value type.
    pub ac_type: AcType,
    /// Rows (1 for scalars and vectors).
    pub rows: usize,
    /// Columns (1 for scalars, length for vectors).
    pub cols: usize,
    /// Name of the declaring stage.
    pub owner: String,
    /// Lifetime of bound values.
    pub persistence: Persistence,
}

struct Variable {
    name: String,
    owner: usize,
    persistence: Persistence,
    value: AcValue,
    bound_cycle: Option<u64>,
}

/// Per-chain registry of named variables.
///
/// The chain tells the space which stage is running ([`enter`](Self::enter))
/// and when a new cycle starts ([`begin_cycle`](Self::begin_cycle)); ownership
/// and read-ahead checks are made against that position.
#[derive(Default)]
pub struct AcSpace {
    variables: Vec<Variable>,
    index: HashMap<String, usize>,
    stage_names: Vec<String>,
    position: usize,
    cycle: u64,
}

impl AcSpace {
    /// Empty space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the name of the stage at `position`, for error reports.
    pub fn register_stage(&mut self, position: usize, name: &str) {
        if self.stage_names.len() <= position {
            self.stage_names.resize(position + 1, String::new());
        }
        self.stage_names[position].clear();
        self.stage_names[position].push_str(name);
    }

    /// Set the position of the running stage.
    #[inline]
    pub fn enter(&mut self, position: usize) {
        self.position = position;
    }

    /// Position of the running stage.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Start a new cycle; transient values of the previous one expire.
    #[inline]
    pub fn begin_cycle(&mut self) {
        self.cycle += 1;
    }

    /// Cycles started so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    fn stage_name(&self, position: usize) -> String {
        match self.stage_names.get(position) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("#{position}"),
        }
    }

    fn validate_name(name: &str) -> Result<(), AcError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(AcError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Declare `name` on behalf of the running stage.
    ///
    /// The initial value fixes type and shape. A stage may declare the same
    /// name again with the same type (for example when re-preparing), which
    /// replaces the buffer.
    pub fn declare(
        &mut self,
        name: &str,
        initial: AcValue,
        persistence: Persistence,
    ) -> Result<(), AcError> {
        Self::validate_name(name)?;
        if !initial.is_consistent() {
            let (rows, cols) = initial.shape();
            return Err(AcError::ShapeMismatch {
                name: name.to_string(),
                expected: rows * cols,
                actual: match &initial {
                    AcValue::Matrix { data, .. } => data.len(),
                    AcValue::Complex { data, .. } => data.len(),
                    _ => 1,
                },
            });
        }
        let bound_cycle = match persistence {
            Persistence::Persistent => Some(self.cycle),
            Persistence::Transient => None,
        };

        if let Some(&i) = self.index.get(name) {
            let existing = &self.variables[i];
            if existing.value.ac_type() != initial.ac_type() {
                return Err(AcError::TypeConflict {
                    name: name.to_string(),
                    declared: existing.value.ac_type(),
                    requested: initial.ac_type(),
                });
            }
            if existing.owner != self.position {
                return Err(AcError::AlreadyDeclared {
                    name: name.to_string(),
                    owner: self.stage_name(existing.owner),
                });
            }
            let var = &mut self.variables[i];
            var.value = initial;
            var.persistence = persistence;
            var.bound_cycle = bound_cycle;
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            name,
            ac_type = %initial.ac_type(),
            owner = self.position,
            "ac_space: declare"
        );

        self.index.insert(name.to_string(), self.variables.len());
        self.variables.push(Variable {
            name: name.to_string(),
            owner: self.position,
            persistence,
            value: initial,
            bound_cycle,
        });
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<usize, AcError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| AcError::NotDeclared {
                name: name.to_string(),
            })
    }

    fn writable(&mut self, name: &str, ac_type: AcType) -> Result<&mut Variable, AcError> {
        let i = self.lookup(name)?;
        let var = &self.variables[i];
        if var.value.ac_type() != ac_type {
            return Err(AcError::TypeConflict {
                name: name.to_string(),
                declared: var.value.ac_type(),
                requested: ac_type,
            });
        }
        if var.owner != self.position {
            return Err(AcError::NotOwner {
                name: name.to_string(),
                owner: self.stage_name(var.owner),
                caller: self.stage_name(self.position),
            });
        }
        let cycle = self.cycle;
        let var = &mut self.variables[i];
        var.bound_cycle = Some(cycle);
        Ok(var)
    }

    /// Bind this cycle's value of an integer variable.
    pub fn bind_int(&mut self, name: &str, value: i64) -> Result<(), AcError> {
        if let AcValue::Int(v) = &mut self.writable(name, AcType::Int)?.value {
            *v = value;
        }
        Ok(())
    }

    /// Bind this cycle's value of a float variable.
    pub fn bind_float(&mut self, name: &str, value: f32) -> Result<(), AcError> {
        if let AcValue::Float(v) = &mut self.writable(name, AcType::Float)?.value {
            *v = value;
        }
        Ok(())
    }

    /// Bind this cycle's value of a vector variable.
    pub fn bind_vector(&mut self, name: &str, values: &[f32]) -> Result<(), AcError> {
        self.check_len(name, values.len())?;
        if let AcValue::Vector(v) = &mut self.writable(name, AcType::Vector)?.value {
            v.copy_from_slice(values);
        }
        Ok(())
    }

    /// Bind this cycle's value of a real matrix (row-major).
    pub fn bind_matrix(&mut self, name: &str, values: &[f32]) -> Result<(), AcError> {
        self.check_len(name, values.len())?;
        if let AcValue::Matrix { data, .. } = &mut self.writable(name, AcType::Matrix)?.value {
            data.copy_from_slice(values);
        }
        Ok(())
    }

    /// Bind this cycle's value of a complex matrix (row-major).
    pub fn bind_complex(&mut self, name: &str, values: &[Complex32]) -> Result<(), AcError> {
        self.check_len(name, values.len())?;
        if let AcValue::Complex { data, .. } = &mut self.writable(name, AcType::Complex)?.value {
            data.copy_from_slice(values);
        }
        Ok(())
    }

    fn check_len(&self, name: &str, actual: usize) -> Result<(), AcError> {
        let i = self.lookup(name)?;
        let (rows, cols) = self.variables[i].value.shape();
        if rows * cols != actual {
            return Err(AcError::ShapeMismatch {
                name: name.to_string(),
                expected: rows * cols,
                actual,
            });
        }
        Ok(())
    }

    /// Read a variable declared at or before the running stage.
    pub fn get(&self, name: &str) -> Result<AcView<'_>, AcError> {
        let var = &self.variables[self.lookup(name)?];
        if var.owner > self.position {
            return Err(AcError::ReadAhead {
                name: name.to_string(),
                owner: self.stage_name(var.owner),
                reader: self.stage_name(self.position),
            });
        }
        let readable = match var.persistence {
            Persistence::Persistent => var.bound_cycle.is_some(),
            Persistence::Transient => var.bound_cycle == Some(self.cycle),
        };
        if !readable {
            return Err(AcError::Unbound {
                name: name.to_string(),
            });
        }
        Ok(match &var.value {
            AcValue::Int(v) => AcView::Int(*v),
            AcValue::Float(v) => AcView::Float(*v),
            AcValue::Vector(v) => AcView::Vector(v),
            AcValue::Matrix { rows, cols, data } => AcView::Matrix(MatrixView {
                rows: *rows,
                cols: *cols,
                data,
            }),
            AcValue::Complex { rows, cols, data } => AcView::Complex(MatrixView {
                rows: *rows,
                cols: *cols,
                data,
            }),
        })
    }

    fn type_conflict(&self, name: &str, view: &AcView<'_>, requested: AcType) -> AcError {
        let declared = match view {
            AcView::Int(_) => AcType::Int,
            AcView::Float(_) => AcType::Float,
            AcView::Vector(_) => AcType::Vector,
            AcView::Matrix(_) => AcType::Matrix,
            AcView::Complex(_) => AcType::Complex,
        };
        AcError::TypeConflict {
            name: name.to_string(),
            declared,
            requested,
        }
    }

    /// Read an integer variable.
    pub fn get_int(&self, name: &str) -> Result<i64, AcError> {
        match self.get(name)? {
            AcView::Int(v) => Ok(v),
            other => Err(self.type_conflict(name, &other, AcType::Int)),
        }
    }

    /// Read a float variable.
    pub fn get_float(&self, name: &str) -> Result<f32, AcError> {
        match self.get(name)? {
            AcView::Float(v) => Ok(v),
            other => Err(self.type_conflict(name, &other, AcType::Float)),
        }
    }

    /// Read a vector variable.
    pub fn get_vector(&self, name: &str) -> Result<&[f32], AcError> {
        match self.get(name)? {
            AcView::Vector(v) => Ok(v),
            other => Err(self.type_conflict(name, &other, AcType::Vector)),
        }
    }

    /// Read a real matrix variable.
    pub fn get_matrix(&self, name: &str) -> Result<MatrixView<'_, f32>, AcError> {
        match self.get(name)? {
            AcView::Matrix(m) => Ok(m),
            other => Err(self.type_conflict(name, &other, AcType::Matrix)),
        }
    }

    /// Read a complex matrix variable.
    pub fn get_complex(&self, name: &str) -> Result<MatrixView<'_, Complex32>, AcError> {
        match self.get(name)? {
            AcView::Complex(m) => Ok(m),
            other => Err(self.type_conflict(name, &other, AcType::Complex)),
        }
    }

    /// True if `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Description of a declared variable.
    pub fn info(&self, name: &str) -> Option<AcInfo> {
        let var = &self.variables[*self.index.get(name)?];
        let (rows, cols) = var.value.shape();
        Some(AcInfo {
            name: var.name.clone(),
            ac_type: var.value.ac_type(),
            rows,
            cols,
            owner: self.stage_name(var.owner),
            persistence: var.persistence,
        })
    }

    /// Declared names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    /// Number of declared variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// True when nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Drop every variable and stage name.
    pub fn clear(&mut self) {
        self.variables.clear();
        self.index.clear();
        self.stage_names.clear();
        self.position = 0;
        self.cycle = 0;
    }
}

impl fmt::Debug for AcSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcSpace")
            .field("variables", &self.names().collect::<Vec<_>>())
            .field("position", &self.position)
            .field("cycle", &self.cycle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> AcSpace {
        let mut ac = AcSpace::new();
        ac.register_stage(0, "producer");
        ac.register_stage(1, "consumer");
        ac
    }

    #[test]
    fn names_are_validated() {
        let mut ac = space();
        for bad in ["", "two words", "tab\tname"] {
            let err = ac
                .declare(bad, AcValue::Float(0.0), Persistence::Transient)
                .unwrap_err();
            assert!(matches!(err, AcError::InvalidName { .. }));
        }
    }

    #[test]
    fn conflicting_type_is_rejected() {
        let mut ac = space();
        ac.declare("x", AcValue::Float(0.0), Persistence::Transient)
            .unwrap();
        ac.enter(1);
        let err = ac
            .declare("x", AcValue::Int(0), Persistence::Transient)
            .unwrap_err();
        assert_eq!(
            err,
            AcError::TypeConflict {
                name: "x".into(),
                declared: AcType::Float,
                requested: AcType::Int,
            }
        );
    }

    #[test]
    fn other_owner_cannot_redeclare() {
        let mut ac = space();
        ac.declare("x", AcValue::Float(0.0), Persistence::Transient)
            .unwrap();
        ac.enter(1);
        let err = ac
            .declare("x", AcValue::Float(1.0), Persistence::Transient)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "AC variable 'x' is already declared by stage 'producer'"
        );

        ac.enter(0);
        ac.declare("x", AcValue::Float(2.0), Persistence::Persistent)
            .unwrap();
        assert_eq!(ac.len(), 1);
    }

    #[test]
    fn read_ahead_is_rejected() {
        let mut ac = space();
        ac.enter(1);
        ac.declare("late", AcValue::Int(0), Persistence::Persistent)
            .unwrap();
        ac.enter(0);
        let err = ac.get_int("late").unwrap_err();
        assert_eq!(
            err.to_string(),
            "stage 'producer' reads AC variable 'late' declared later by 'consumer'"
        );
        ac.enter(1);
        assert_eq!(ac.get_int("late").unwrap(), 0);
    }

    #[test]
    fn transient_values_expire_each_cycle() {
        let mut ac = space();
        ac.declare("x", AcValue::Float(0.0), Persistence::Transient)
            .unwrap();
        ac.begin_cycle();
        ac.enter(1);
        assert!(matches!(ac.get("x"), Err(AcError::Unbound { .. })));

        ac.enter(0);
        ac.bind_float("x", 1.5).unwrap();
        ac.enter(1);
        assert_eq!(ac.get_float("x").unwrap(), 1.5);

        ac.begin_cycle();
        assert!(matches!(ac.get("x"), Err(AcError::Unbound { .. })));
    }

    #[test]
    fn persistent_values_survive_cycles() {
        let mut ac = space();
        ac.declare("gain", AcValue::Float(0.5), Persistence::Persistent)
            .unwrap();
        ac.enter(1);
        for _ in 0..3 {
            ac.begin_cycle();
            assert_eq!(ac.get_float("gain").unwrap(), 0.5);
        }
    }

    #[test]
    fn only_owner_binds() {
        let mut ac = space();
        ac.declare("x", AcValue::Int(0), Persistence::Transient)
            .unwrap();
        ac.enter(1);
        let err = ac.bind_int("x", 3).unwrap_err();
        assert!(matches!(err, AcError::NotOwner { .. }));
    }

    #[test]
    fn shapes_are_enforced() {
        let mut ac = space();
        ac.declare("spec", AcValue::matrix(2, 3), Persistence::Transient)
            .unwrap();
        let err = ac.bind_matrix("spec", &[0.0; 5]).unwrap_err();
        assert_eq!(
            err,
            AcError::ShapeMismatch {
                name: "spec".into(),
                expected: 6,
                actual: 5
            }
        );
        ac.begin_cycle();
        ac.bind_matrix("spec", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let m = ac.get_matrix("spec").unwrap();
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
        assert!(matches!(
            ac.get_vector("spec"),
            Err(AcError::TypeConflict { .. })
        ));
    }

    #[test]
    fn complex_and_vector_round_trip() {
        let mut ac = space();
        ac.declare("bins", AcValue::complex(1, 2), Persistence::Transient)
            .unwrap();
        ac.declare("env", AcValue::vector(3), Persistence::Transient)
            .unwrap();
        ac.begin_cycle();
        let bins = [Complex32::new(1.0, -1.0), Complex32::new(0.0, 2.0)];
        ac.bind_complex("bins", &bins).unwrap();
        ac.bind_vector("env", &[0.1, 0.2, 0.3]).unwrap();
        ac.enter(1);
        assert_eq!(ac.get_complex("bins").unwrap().data, &bins);
        assert_eq!(ac.get_vector("env").unwrap(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn introspection_and_clear() {
        let mut ac = space();
        ac.declare("a", AcValue::Int(1), Persistence::Persistent)
            .unwrap();
        ac.declare("b", AcValue::vector(4), Persistence::Transient)
            .unwrap();
        assert_eq!(ac.names().collect::<Vec<_>>(), ["a", "b"]);
        let info = ac.info("b").unwrap();
        assert_eq!((info.rows, info.cols), (1, 4));
        assert_eq!(info.owner, "producer");
        assert!(ac.contains("a"));

        ac.clear();
        assert!(ac.is_empty());
        assert!(matches!(ac.get("a"), Err(AcError::NotDeclared { .. })));
    }
}
