//! Wire form of a schema
//!
//! Descriptors carry type, metric and index names as strings and
//! dimensionality as a signed integer, so that malformed input from
//! configuration files or remote callers is rejected by [`Schema::try_from`]
//! with a `SchemaValidation` error instead of failing to deserialize.

use serde::{Deserialize, Serialize};

use super::{ColumnDef, ColumnKind, Schema};
use crate::error::{VectorDbError, VectorDbResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDescriptor {
    pub columns: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: KindDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindDescriptor {
    Scalar {
        #[serde(rename = "type")]
        ty: String,
    },
    Vector {
        dims: i64,
        metric: String,
        index: String,
    },
}

impl SchemaDescriptor {
    pub fn from_json(input: &str) -> VectorDbResult<Self> {
        serde_json::from_str(input).map_err(|e| VectorDbError::schema(format!("malformed schema: {}", e)))
    }

    pub fn from_yaml(input: &str) -> VectorDbResult<Self> {
        serde_yaml::from_str(input).map_err(|e| VectorDbError::schema(format!("malformed schema: {}", e)))
    }

    pub fn to_json(&self) -> String {
        // Plain strings and integers always serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl TryFrom<SchemaDescriptor> for Schema {
    type Error = VectorDbError;

    fn try_from(descriptor: SchemaDescriptor) -> Result<Self, Self::Error> {
        let columns = descriptor
            .columns
            .into_iter()
            .map(ColumnDef::try_from)
            .collect::<VectorDbResult<Vec<_>>>()?;
        Schema::new(columns)
    }
}

impl TryFrom<ColumnDescriptor> for ColumnDef {
    type Error = VectorDbError;

    fn try_from(column: ColumnDescriptor) -> Result<Self, Self::Error> {
        let kind = match column.kind {
            KindDescriptor::Scalar { ty } => ColumnKind::Scalar(ty.parse()?),
            KindDescriptor::Vector { dims, metric, index } => {
                if dims <= 0 {
                    return Err(VectorDbError::schema(format!(
                        "vector column '{}' must have dims > 0, got {}",
                        column.name, dims
                    )));
                }
                let dims = usize::try_from(dims)
                    .map_err(|_| VectorDbError::schema(format!("dims {} out of range", dims)))?;
                return Ok(ColumnDef::vector(column.name, dims, metric.parse()?, index.parse()?));
            }
        };
        Ok(ColumnDef { name: column.name, kind })
    }
}

impl From<&Schema> for SchemaDescriptor {
    fn from(schema: &Schema) -> Self {
        let columns = schema
            .columns()
            .iter()
            .map(|column| ColumnDescriptor {
                name: column.name.clone(),
                kind: match column.kind {
                    ColumnKind::Scalar(ty) => KindDescriptor::Scalar {
                        ty: ty.name().to_string(),
                    },
                    ColumnKind::Vector(spec) => KindDescriptor::Vector {
                        dims: spec.dims as i64,
                        metric: spec.metric.name().to_string(),
                        index: spec.index.name().to_string(),
                    },
                },
            })
            .collect();
        SchemaDescriptor { columns }
    }
}
