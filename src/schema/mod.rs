//! Table schemas
//!
//! A schema is an ordered list of uniquely named columns: any number of
//! scalar columns and exactly one vector column. It is validated once, at
//! table creation, and is immutable afterwards; every inserted row is
//! checked against it.

pub mod descriptor;
pub mod row;
pub mod value;

pub use descriptor::{ColumnDescriptor, KindDescriptor, SchemaDescriptor};
pub use row::{NewRow, RankedRow, Record, RowId};
pub use value::Value;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{check_dims, VectorDbError, VectorDbResult};
use crate::vector::{DistanceMetric, IndexKind};

/// Type of a scalar column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    String,
    Integer,
    Float,
    Boolean,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Integer => "integer",
            ScalarType::Float => "float",
            ScalarType::Boolean => "boolean",
        }
    }

    /// Whether `<`, `<=`, `>`, `>=` are defined on this type
    pub fn is_ordered(&self) -> bool {
        !matches!(self, ScalarType::Boolean)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarType {
    type Err = VectorDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" | "text" | "utf8" => Ok(ScalarType::String),
            "integer" | "int" | "int64" | "i64" => Ok(ScalarType::Integer),
            "float" | "double" | "float64" | "f64" => Ok(ScalarType::Float),
            "boolean" | "bool" => Ok(ScalarType::Boolean),
            other => Err(VectorDbError::schema(format!("unknown scalar type '{}'", other))),
        }
    }
}

/// Shape of the vector column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorSpec {
    pub dims: usize,
    pub metric: DistanceMetric,
    pub index: IndexKind,
}

impl VectorSpec {
    pub fn new(dims: usize, metric: DistanceMetric, index: IndexKind) -> Self {
        Self { dims, metric, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Scalar(ScalarType),
    Vector(VectorSpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Scalar(ty),
        }
    }

    pub fn vector(name: impl Into<String>, dims: usize, metric: DistanceMetric, index: IndexKind) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Vector(VectorSpec::new(dims, metric, index)),
        }
    }
}

/// Validated, immutable table schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnDef>,
    vector_column: usize,
    /// Scalar columns in schema order; a row's values are stored in this order
    scalars: Vec<(String, ScalarType)>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> VectorDbResult<Self> {
        let mut seen = HashSet::new();
        let mut vector_column = None;

        for (position, column) in columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(VectorDbError::schema("column names must be non-empty"));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(VectorDbError::schema(format!("duplicate column name '{}'", column.name)));
            }
            if let ColumnKind::Vector(spec) = &column.kind {
                if spec.dims == 0 {
                    return Err(VectorDbError::schema(format!(
                        "vector column '{}' must have dims > 0",
                        column.name
                    )));
                }
                if vector_column.replace(position).is_some() {
                    return Err(VectorDbError::schema("a table has exactly one vector column"));
                }
            }
        }

        let vector_column =
            vector_column.ok_or_else(|| VectorDbError::schema("a table has exactly one vector column"))?;
        let scalars = columns
            .iter()
            .filter_map(|c| match c.kind {
                ColumnKind::Scalar(ty) => Some((c.name.clone(), ty)),
                ColumnKind::Vector(_) => None,
            })
            .collect();

        Ok(Self {
            columns,
            vector_column,
            scalars,
        })
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn vector_column_name(&self) -> &str {
        &self.columns[self.vector_column].name
    }

    pub fn vector_spec(&self) -> VectorSpec {
        match self.columns[self.vector_column].kind {
            ColumnKind::Vector(spec) => spec,
            ColumnKind::Scalar(_) => unreachable!("vector_column always indexes a vector column"),
        }
    }

    pub fn dims(&self) -> usize {
        self.vector_spec().dims
    }

    pub fn metric(&self) -> DistanceMetric {
        self.vector_spec().metric
    }

    pub fn index_kind(&self) -> IndexKind {
        self.vector_spec().index
    }

    /// Scalar columns in schema order
    pub fn scalar_columns(&self) -> &[(String, ScalarType)] {
        &self.scalars
    }

    /// Position and type of a scalar column among the scalar columns
    pub fn scalar_slot(&self, name: &str) -> Option<(usize, ScalarType)> {
        self.scalars
            .iter()
            .position(|(n, _)| n == name)
            .map(|slot| (slot, self.scalars[slot].1))
    }

    /// Checks a row against the schema without consuming it
    pub(crate) fn check_row(&self, row: &NewRow) -> VectorDbResult<()> {
        check_dims(self.dims(), row.vector.len())?;

        for name in row.attributes.keys() {
            if self.scalar_slot(name).is_none() {
                return Err(VectorDbError::schema(if name == self.vector_column_name() {
                    format!("'{}' is the vector column, not an attribute", name)
                } else {
                    format!("unknown column '{}'", name)
                }));
            }
        }

        for (name, ty) in &self.scalars {
            match row.attributes.get(name) {
                None => return Err(VectorDbError::schema(format!("missing value for column '{}'", name))),
                Some(value) if !value.fits(*ty) => {
                    return Err(VectorDbError::schema(format!(
                        "column '{}' expects {}, got {}",
                        name,
                        ty,
                        value.type_name()
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Splits a checked row into its vector and its values in scalar order
    pub(crate) fn into_parts(&self, mut row: NewRow) -> (Arc<[f32]>, Vec<Value>) {
        let values = self
            .scalars
            .iter()
            .map(|(name, ty)| row.attributes.remove(name).unwrap_or(Value::Null).coerce(*ty))
            .collect();
        (Arc::from(row.vector), values)
    }

    pub fn to_descriptor(&self) -> SchemaDescriptor {
        SchemaDescriptor::from(self)
    }
}

impl TryFrom<Vec<ColumnDef>> for Schema {
    type Error = VectorDbError;

    fn try_from(columns: Vec<ColumnDef>) -> Result<Self, Self::Error> {
        Schema::new(columns)
    }
}

/// Incremental schema construction
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    columns: Vec<ColumnDef>,
}

impl SchemaBuilder {
    pub fn scalar(mut self, name: impl Into<String>, ty: ScalarType) -> Self {
        self.columns.push(ColumnDef::scalar(name, ty));
        self
    }

    pub fn vector(mut self, name: impl Into<String>, dims: usize, metric: DistanceMetric, index: IndexKind) -> Self {
        self.columns.push(ColumnDef::vector(name, dims, metric, index));
        self
    }

    pub fn build(self) -> VectorDbResult<Schema> {
        Schema::new(self.columns)
    }
}
