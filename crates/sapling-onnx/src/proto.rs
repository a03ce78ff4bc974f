//! Subset of the ONNX protobuf schema needed to describe tree ensembles.
//!
//! Field tags follow `onnx.proto`; only the messages and fields this crate
//! reads or writes are declared. Unknown fields in decoded artifacts are
//! skipped.

/// Top-level ONNX model.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ModelProto {
    /// IR version the model conforms to.
    #[prost(int64, tag = "1")]
    pub ir_version: i64,
    /// Tool that wrote the model.
    #[prost(string, tag = "2")]
    pub producer_name: String,
    /// Version of the producing tool.
    #[prost(string, tag = "3")]
    pub producer_version: String,
    /// Reverse-DNS namespace of the model.
    #[prost(string, tag = "4")]
    pub domain: String,
    /// Version of the model itself.
    #[prost(int64, tag = "5")]
    pub model_version: i64,
    /// Human-readable description.
    #[prost(string, tag = "6")]
    pub doc_string: String,
    /// The computation graph.
    #[prost(message, optional, tag = "7")]
    pub graph: Option<GraphProto>,
    /// Operator sets the graph uses.
    #[prost(message, repeated, tag = "8")]
    pub opset_import: Vec<OperatorSetIdProto>,
    /// Free-form metadata.
    #[prost(message, repeated, tag = "14")]
    pub metadata_props: Vec<StringStringEntryProto>,
}

/// Operator set a model depends on.
#[derive(Clone, PartialEq, prost::Message)]
pub struct OperatorSetIdProto {
    /// Operator domain; empty for the default domain.
    #[prost(string, tag = "1")]
    pub domain: String,
    /// Operator set version.
    #[prost(int64, tag = "2")]
    pub version: i64,
}

/// Free-form key/value metadata.
#[derive(Clone, PartialEq, prost::Message)]
pub struct StringStringEntryProto {
    /// Entry key.
    #[prost(string, tag = "1")]
    pub key: String,
    /// Entry value.
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Computation graph.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GraphProto {
    /// Nodes in topological order.
    #[prost(message, repeated, tag = "1")]
    pub node: Vec<NodeProto>,
    /// Graph name.
    #[prost(string, tag = "2")]
    pub name: String,
    /// Human-readable description.
    #[prost(string, tag = "10")]
    pub doc_string: String,
    /// Graph inputs.
    #[prost(message, repeated, tag = "11")]
    pub input: Vec<ValueInfoProto>,
    /// Graph outputs.
    #[prost(message, repeated, tag = "12")]
    pub output: Vec<ValueInfoProto>,
    /// Types of intermediate values.
    #[prost(message, repeated, tag = "13")]
    pub value_info: Vec<ValueInfoProto>,
}

/// One operator invocation.
#[derive(Clone, PartialEq, prost::Message)]
pub struct NodeProto {
    /// Names of consumed values.
    #[prost(string, repeated, tag = "1")]
    pub input: Vec<String>,
    /// Names of produced values.
    #[prost(string, repeated, tag = "2")]
    pub output: Vec<String>,
    /// Node name.
    #[prost(string, tag = "3")]
    pub name: String,
    /// Operator type, such as `Squeeze`.
    #[prost(string, tag = "4")]
    pub op_type: String,
    /// Operator attributes.
    #[prost(message, repeated, tag = "5")]
    pub attribute: Vec<AttributeProto>,
    /// Human-readable description.
    #[prost(string, tag = "6")]
    pub doc_string: String,
    /// Operator domain; empty for the default domain.
    #[prost(string, tag = "7")]
    pub domain: String,
}

/// Discriminant for [`AttributeProto`] payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AttributeType {
    /// No payload.
    Undefined = 0,
    /// Single float.
    Float = 1,
    /// Single integer.
    Int = 2,
    /// Single string.
    String = 3,
    /// Float list.
    Floats = 6,
    /// Integer list.
    Ints = 7,
    /// String list.
    Strings = 8,
}

/// Named operator attribute.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AttributeProto {
    /// Attribute name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Float payload.
    #[prost(float, tag = "2")]
    pub f: f32,
    /// Integer payload.
    #[prost(int64, tag = "3")]
    pub i: i64,
    /// String payload as UTF-8 bytes.
    #[prost(bytes = "vec", tag = "4")]
    pub s: Vec<u8>,
    /// Float list payload.
    #[prost(float, repeated, packed = "false", tag = "7")]
    pub floats: Vec<f32>,
    /// Integer list payload.
    #[prost(int64, repeated, packed = "false", tag = "8")]
    pub ints: Vec<i64>,
    /// String list payload.
    #[prost(bytes = "vec", repeated, tag = "9")]
    pub strings: Vec<Vec<u8>>,
    /// Which payload is set, as an [`AttributeType`].
    #[prost(enumeration = "AttributeType", tag = "20")]
    pub r#type: i32,
}

impl AttributeProto {
    /// Single integer attribute.
    pub fn int(name: &str, value: i64) -> Self {
        Self {
            name: name.to_owned(),
            i: value,
            r#type: AttributeType::Int as i32,
            ..Self::default()
        }
    }

    /// Single string attribute.
    pub fn string(name: &str, value: &str) -> Self {
        Self {
            name: name.to_owned(),
            s: value.as_bytes().to_vec(),
            r#type: AttributeType::String as i32,
            ..Self::default()
        }
    }

    /// Integer list attribute.
    pub fn ints(name: &str, values: Vec<i64>) -> Self {
        Self {
            name: name.to_owned(),
            ints: values,
            r#type: AttributeType::Ints as i32,
            ..Self::default()
        }
    }

    /// Float list attribute.
    pub fn floats(name: &str, values: Vec<f32>) -> Self {
        Self {
            name: name.to_owned(),
            floats: values,
            r#type: AttributeType::Floats as i32,
            ..Self::default()
        }
    }

    /// String list attribute.
    pub fn strings<'a>(name: &str, values: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            name: name.to_owned(),
            strings: values.into_iter().map(|v| v.as_bytes().to_vec()).collect(),
            r#type: AttributeType::Strings as i32,
            ..Self::default()
        }
    }
}

/// Named, typed graph input or output.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ValueInfoProto {
    /// Value name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Value type.
    #[prost(message, optional, tag = "2")]
    pub r#type: Option<TypeProto>,
    /// Human-readable description.
    #[prost(string, tag = "3")]
    pub doc_string: String,
}

/// Type of a graph value.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TypeProto {
    /// The concrete type.
    #[prost(oneof = "type_proto::Value", tags = "1")]
    pub value: Option<type_proto::Value>,
    /// Optional semantic denotation.
    #[prost(string, tag = "6")]
    pub denotation: String,
}

pub mod type_proto {
    /// Kinds of value types.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Value {
        /// Dense tensor.
        #[prost(message, tag = "1")]
        TensorType(super::TensorTypeProto),
    }
}

/// Dense tensor type: element type plus shape.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TensorTypeProto {
    /// Element type, such as [`ELEM_FLOAT`].
    #[prost(int32, tag = "1")]
    pub elem_type: i32,
    /// Declared shape, if any.
    #[prost(message, optional, tag = "2")]
    pub shape: Option<TensorShapeProto>,
}

/// Tensor shape as a list of fixed or symbolic dimensions.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TensorShapeProto {
    /// Dimensions, outermost first.
    #[prost(message, repeated, tag = "1")]
    pub dim: Vec<Dimension>,
}

/// One tensor dimension.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Dimension {
    /// Fixed or symbolic size.
    #[prost(oneof = "dimension::Value", tags = "1, 2")]
    pub value: Option<dimension::Value>,
}

pub mod dimension {
    /// Fixed size or named symbolic size.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Value {
        /// Fixed size.
        #[prost(int64, tag = "1")]
        DimValue(i64),
        /// Named symbolic size.
        #[prost(string, tag = "2")]
        DimParam(String),
    }
}

/// `TensorProto.DataType.FLOAT`.
pub const ELEM_FLOAT: i32 = 1;

/// `TensorProto.DataType.INT64`.
pub const ELEM_INT64: i32 = 7;

impl ValueInfoProto {
    /// Tensor value with the given element type and dimensions.
    pub fn tensor(name: &str, elem_type: i32, dims: Vec<dimension::Value>) -> Self {
        let shape = TensorShapeProto {
            dim: dims
                .into_iter()
                .map(|value| Dimension { value: Some(value) })
                .collect(),
        };
        Self {
            name: name.to_owned(),
            r#type: Some(TypeProto {
                value: Some(type_proto::Value::TensorType(TensorTypeProto {
                    elem_type,
                    shape: Some(shape),
                })),
                denotation: String::new(),
            }),
            doc_string: String::new(),
        }
    }

    /// Element type and dimensions, when this value is a tensor.
    pub fn tensor_type(&self) -> Option<&TensorTypeProto> {
        match self.r#type.as_ref()?.value.as_ref()? {
            type_proto::Value::TensorType(tensor) => Some(tensor),
        }
    }
}
