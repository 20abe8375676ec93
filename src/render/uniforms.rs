use bevy::math::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use derive_more::From;
use std::collections::BTreeMap;

pub const DAY_TEXTURE_ALPHA: &str = "dayTextureAlpha";
pub const DAY_TEXTURE_BRIGHTNESS: &str = "dayTextureBrightness";
pub const DAY_TEXTURE_CONTRAST: &str = "dayTextureContrast";
/// Stores the reciprocal of the layer's gamma.
pub const DAY_TEXTURE_ONE_OVER_GAMMA: &str = "dayTextureOneOverGamma";
pub const DAY_TEXTURE_TEX_COORDS_EXTENT: &str = "dayTextureTexCoordsExtent";
pub const DAY_TEXTURE_TRANSLATION_AND_SCALE: &str = "dayTextureTranslationAndScale";
pub const DAY_TEXTURE_COUNT: &str = "dayTextureCount";

/// The GLSL type of a uniform, with the value of the matching GL enum.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum UniformDatatype {
    Float = 0x1406,
    FloatVector2 = 0x8B50,
    FloatVector3 = 0x8B51,
    FloatVector4 = 0x8B52,
    Int = 0x1404,
    IntVector2 = 0x8B53,
    IntVector3 = 0x8B54,
    IntVector4 = 0x8B55,
    Bool = 0x8B56,
    BoolVector2 = 0x8B57,
    BoolVector3 = 0x8B58,
    BoolVector4 = 0x8B59,
    FloatMatrix2 = 0x8B5A,
    FloatMatrix3 = 0x8B5B,
    FloatMatrix4 = 0x8B5C,
    Sampler2D = 0x8B5E,
    SamplerCube = 0x8B60,
}

impl UniformDatatype {
    pub fn gl_enum(self) -> u32 {
        self as u32
    }

    pub fn glsl(self) -> &'static str {
        match self {
            UniformDatatype::Float => "float",
            UniformDatatype::FloatVector2 => "vec2",
            UniformDatatype::FloatVector3 => "vec3",
            UniformDatatype::FloatVector4 => "vec4",
            UniformDatatype::Int => "int",
            UniformDatatype::IntVector2 => "ivec2",
            UniformDatatype::IntVector3 => "ivec3",
            UniformDatatype::IntVector4 => "ivec4",
            UniformDatatype::Bool => "bool",
            UniformDatatype::BoolVector2 => "bvec2",
            UniformDatatype::BoolVector3 => "bvec3",
            UniformDatatype::BoolVector4 => "bvec4",
            UniformDatatype::FloatMatrix2 => "mat2",
            UniformDatatype::FloatMatrix3 => "mat3",
            UniformDatatype::FloatMatrix4 => "mat4",
            UniformDatatype::Sampler2D => "sampler2D",
            UniformDatatype::SamplerCube => "samplerCube",
        }
    }

    pub fn from_gl_enum(value: u32) -> Option<Self> {
        use UniformDatatype::*;

        [
            Float, FloatVector2, FloatVector3, FloatVector4, Int, IntVector2, IntVector3,
            IntVector4, Bool, BoolVector2, BoolVector3, BoolVector4, FloatMatrix2, FloatMatrix3,
            FloatMatrix4, Sampler2D, SamplerCube,
        ]
        .into_iter()
        .find(|datatype| datatype.gl_enum() == value)
    }
}

/// The value of a uniform. Arrays hold one element per bound texture.
#[derive(Clone, Debug, PartialEq, From)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Int(i32),
    Bool(bool),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
    FloatArray(Vec<f32>),
    /// A `float` array in double precision, narrowed by the backend when it is uploaded.
    DoubleArray(Vec<f64>),
    Vec4Array(Vec<Vec4>),
}

impl UniformValue {
    pub fn datatype(&self) -> UniformDatatype {
        match self {
            UniformValue::Float(_) | UniformValue::FloatArray(_) | UniformValue::DoubleArray(_) => {
                UniformDatatype::Float
            }
            UniformValue::Vec2(_) => UniformDatatype::FloatVector2,
            UniformValue::Vec3(_) => UniformDatatype::FloatVector3,
            UniformValue::Vec4(_) | UniformValue::Vec4Array(_) => UniformDatatype::FloatVector4,
            UniformValue::Int(_) => UniformDatatype::Int,
            UniformValue::Bool(_) => UniformDatatype::Bool,
            UniformValue::Mat2(_) => UniformDatatype::FloatMatrix2,
            UniformValue::Mat3(_) => UniformDatatype::FloatMatrix3,
            UniformValue::Mat4(_) => UniformDatatype::FloatMatrix4,
        }
    }

    pub fn as_float_array(&self) -> Option<&[f32]> {
        match self {
            UniformValue::FloatArray(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_double_array(&self) -> Option<&[f64]> {
        match self {
            UniformValue::DoubleArray(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_vec4_array(&self) -> Option<&[Vec4]> {
        match self {
            UniformValue::Vec4Array(values) => Some(values),
            _ => None,
        }
    }
}

/// The uniform values of a draw command, keyed by their name in the shader.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UniformMap(BTreeMap<&'static str, UniformValue>);

impl UniformMap {
    pub fn insert(&mut self, name: &'static str, value: impl Into<UniformValue>) {
        self.0.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.0.get(name)
    }

    pub fn float_array(&self, name: &str) -> Option<&[f32]> {
        self.get(name)?.as_float_array()
    }

    pub fn double_array(&self, name: &str) -> Option<&[f64]> {
        self.get(name)?.as_double_array()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &UniformValue)> {
        self.0.iter().map(|(&name, value)| (name, value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datatypes_match_gl_enums() {
        assert_eq!(UniformDatatype::FloatVector4.gl_enum(), 0x8B52);
        assert_eq!(UniformDatatype::SamplerCube.glsl(), "samplerCube");
        assert_eq!(
            UniformDatatype::from_gl_enum(0x8B5C),
            Some(UniformDatatype::FloatMatrix4)
        );
        assert_eq!(UniformDatatype::from_gl_enum(0), None);
    }

    #[test]
    fn values_report_their_datatype() {
        let mut uniforms = UniformMap::default();
        uniforms.insert(DAY_TEXTURE_ALPHA, vec![0.5_f32, 1.0]);
        uniforms.insert(DAY_TEXTURE_BRIGHTNESS, vec![0.1_f64]);
        uniforms.insert(DAY_TEXTURE_COUNT, 2_i32);
        uniforms.insert(DAY_TEXTURE_TRANSLATION_AND_SCALE, vec![Vec4::ONE]);

        assert_eq!(uniforms.float_array(DAY_TEXTURE_ALPHA), Some(&[0.5, 1.0][..]));
        assert_eq!(uniforms.double_array(DAY_TEXTURE_BRIGHTNESS), Some(&[0.1][..]));
        assert_eq!(uniforms.float_array(DAY_TEXTURE_BRIGHTNESS), None);
        assert_eq!(
            uniforms.get(DAY_TEXTURE_BRIGHTNESS).map(UniformValue::datatype),
            Some(UniformDatatype::Float)
        );
        assert_eq!(
            uniforms.get(DAY_TEXTURE_COUNT).map(UniformValue::datatype),
            Some(UniformDatatype::Int)
        );
        assert_eq!(
            uniforms
                .get(DAY_TEXTURE_TRANSLATION_AND_SCALE)
                .map(UniformValue::datatype),
            Some(UniformDatatype::FloatVector4)
        );
    }
}
