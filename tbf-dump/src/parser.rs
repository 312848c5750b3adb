//! Parses the canonical textual rendering that `tbf::ObjectReader` prints
//! and replays it through a `tbf::Writer`. The grammar is whitespace
//! tolerant; every field reads `key: type = value,` where the key is either
//! an identifier or `@id`.

use anyhow::{anyhow, bail, ensure, Result};
use base64::decode;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1, take_while_m_n},
    character::complete::{digit1, none_of, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::{many0, separated_list0},
    sequence::{delimited, preceded, tuple},
    Finish, IResult,
};
use tbf::{ObjectWriter, Tag, Writer};

const WHITESPACE: &str = " \t\r\n";
const B64_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Clone)]
pub enum Node {
    Int(i128),
    Float(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Uuid([u8; 16]),
    Object(Vec<Field>),
    List(Vec<Node>),
    Vector(Vec<Node>),
}

#[derive(Clone)]
pub enum FieldKey {
    Name(String),
    Id(u16),
}

#[derive(Clone)]
pub struct Field {
    pub key: FieldKey,
    pub ty: String,
    pub value: Node,
}

fn white(i: &str) -> IResult<&str, &str> {
    take_while(move |c| WHITESPACE.contains(c))(i)
}

fn ident(i: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(i)
}

fn key(i: &str) -> IResult<&str, FieldKey> {
    alt((
        map_res(preceded(tag("@"), digit1), |d: &str| d.parse::<u16>().map(FieldKey::Id)),
        map(ident, |name| FieldKey::Name(name.to_string())),
    ))(i)
}

fn type_token(i: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '[' || c == ']')(i)
}

fn number(i: &str) -> IResult<&str, Node> {
    map_res(
        recognize(tuple((
            opt(tag("-")),
            digit1,
            opt(tuple((tag("."), digit1))),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| {
            if s.contains('.') || s.contains('e') || s.contains('E') {
                s.parse::<f64>().map(Node::Float).map_err(|e| e.to_string())
            } else {
                s.parse::<i128>().map(Node::Int).map_err(|e| e.to_string())
            }
        },
    )(i)
}

fn string(i: &str) -> IResult<&str, String> {
    delimited(
        tag("\""),
        map(
            opt(nom::bytes::complete::escaped_transform(
                none_of("\\\""),
                '\\',
                alt((
                    value("\\", tag("\\")),
                    value("\"", tag("\"")),
                    value("\n", tag("n")),
                )),
            )),
            |s| s.unwrap_or_default(),
        ),
        tag("\""),
    )(i)
}

fn b64(i: &str) -> IResult<&str, &str> {
    recognize(tuple((
        take_while(move |c| B64_CHARS.contains(c)),
        opt(tag("=")),
        opt(tag("=")),
    )))(i)
}

fn bytes(i: &str) -> IResult<&str, Vec<u8>> {
    map_res(delimited(tag("'"), b64, tag("'")), decode)(i)
}

fn hexn(n: usize) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |i| take_while_m_n(n, n, |c: char| c.is_ascii_hexdigit())(i)
}

fn uuid(i: &str) -> IResult<&str, [u8; 16]> {
    map_res(
        recognize(tuple((
            hexn(8),
            tag("-"),
            hexn(4),
            tag("-"),
            hexn(4),
            tag("-"),
            hexn(4),
            tag("-"),
            hexn(12),
        ))),
        |s: &str| {
            let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(16)).collect();
            if digits.len() != 32 {
                return Err("malformed uuid");
            }
            let mut out = [0u8; 16];
            for (index, pair) in digits.chunks(2).enumerate() {
                out[index] = (pair[0] * 16 + pair[1]) as u8;
            }
            Ok(out)
        },
    )(i)
}

fn keyword(i: &str) -> IResult<&str, Node> {
    alt((
        value(Node::Bool(true), tag("true")),
        value(Node::Bool(false), tag("false")),
    ))(i)
}

fn list(i: &str) -> IResult<&str, Node> {
    map(
        delimited(
            tuple((tag("["), white)),
            separated_list0(tuple((white, tag(","), white)), node),
            tuple((white, opt(tag(",")), white, tag("]"))),
        ),
        Node::List,
    )(i)
}

fn vector(i: &str) -> IResult<&str, Node> {
    map(
        delimited(
            tuple((tag("<"), white)),
            separated_list0(tuple((white, tag(","), white)), node),
            tuple((white, tag(">"))),
        ),
        Node::Vector,
    )(i)
}

fn object(i: &str) -> IResult<&str, Vec<Field>> {
    delimited(tuple((tag("("), white)), many0(field), tuple((white, tag(")"))))(i)
}

fn field(i: &str) -> IResult<&str, Field> {
    map(
        tuple((
            key,
            white,
            tag(":"),
            white,
            type_token,
            white,
            tag("="),
            white,
            node,
            white,
            tag(","),
            white,
        )),
        |(key, _, _, _, ty, _, _, _, value, _, _, _)| Field { key, ty: ty.to_string(), value },
    )(i)
}

fn node(i: &str) -> IResult<&str, Node> {
    alt((
        map(object, Node::Object),
        map(string, Node::Str),
        map(bytes, Node::Bytes),
        map(uuid, Node::Uuid),
        keyword,
        number,
        list,
        vector,
    ))(i)
}

pub fn parse(i: &str) -> Result<Vec<Field>> {
    Ok(all_consuming(delimited(white, object, white))(i)
        .finish()
        .map_err(|e| anyhow!("{}", e))?
        .1)
}

/// Parses the textual rendering and replays it into a fresh binary object.
pub fn to_bytes(input: &str, name_based: bool) -> Result<Vec<u8>> {
    let fields = parse(input)?;
    let mut writer = Writer::new(name_based);
    emit_fields(&mut writer.root(), &fields)?;
    Ok(writer.finish())
}

fn emit_fields(object: &mut ObjectWriter<'_>, fields: &[Field]) -> Result<()> {
    for field in fields {
        emit_field(object, field)?;
    }
    Ok(())
}

// deprecated unsigned fields must still round-trip through the tool
#[allow(deprecated)]
fn emit_field(object: &mut ObjectWriter<'_>, field: &Field) -> Result<()> {
    let tag = match &field.key {
        FieldKey::Name(name) => {
            Tag::try_new(name).map_err(|e| anyhow!("bad tag name {:?}: {}", name, e))?
        }
        FieldKey::Id(id) => Tag::from_id(*id),
    };
    let node = &field.value;
    match field.ty.as_str() {
        "i8" => object.field_i8(tag, int(node, i8::MIN as i128, i8::MAX as i128)? as i8),
        "i16" => object.field_i16(tag, int(node, i16::MIN as i128, i16::MAX as i128)? as i16),
        "i32" => object.field_i32(tag, int(node, i32::MIN as i128, i32::MAX as i128)? as i32),
        "i64" => object.field_i64(tag, int(node, i64::MIN as i128, i64::MAX as i128)? as i64),
        "u8" => object.field_u8(tag, int(node, 0, u8::MAX as i128)? as u8),
        "u16" => object.field_u16(tag, int(node, 0, u16::MAX as i128)? as u16),
        "u32" => object.field_u32(tag, int(node, 0, u32::MAX as i128)? as u32),
        "u64" => object.field_u64(tag, int(node, 0, u64::MAX as i128)? as u64),
        "bool" => object.field_bool(tag, bool_value(node)?),
        "f16" => object.field_f16(tag, int(node, 0, u16::MAX as i128)? as u16),
        "f32" => object.field_f32(tag, float(node)? as f32),
        "f64" => object.field_f64(tag, float(node)?),
        "uuid" => object.field_uuid(tag, uuid_value(node)?),
        "str" => object.field_str(tag, str_value(node)?)?,
        "bin" => object.field_bytes(tag, bytes_value(node)?)?,
        "obj" => {
            let mut sub = object.field_object(tag);
            emit_fields(&mut sub, object_value(node)?)?;
        }
        "i8[]" => {
            let values = scalars(node, |n| Ok(int(n, i8::MIN as i128, i8::MAX as i128)? as i8))?;
            object.field_i8_array(tag, &values)?;
        }
        "i16[]" => {
            let values = scalars(node, |n| Ok(int(n, i16::MIN as i128, i16::MAX as i128)? as i16))?;
            object.field_i16_array(tag, &values)?;
        }
        "i32[]" => {
            let values = scalars(node, |n| Ok(int(n, i32::MIN as i128, i32::MAX as i128)? as i32))?;
            object.field_i32_array(tag, &values)?;
        }
        "i64[]" => {
            let values = scalars(node, |n| Ok(int(n, i64::MIN as i128, i64::MAX as i128)? as i64))?;
            object.field_i64_array(tag, &values)?;
        }
        "u8[]" => {
            let values = scalars(node, |n| Ok(int(n, 0, u8::MAX as i128)? as u8))?;
            object.field_u8_array(tag, &values)?;
        }
        "u16[]" => {
            let values = scalars(node, |n| Ok(int(n, 0, u16::MAX as i128)? as u16))?;
            object.field_u16_array(tag, &values)?;
        }
        "u32[]" => {
            let values = scalars(node, |n| Ok(int(n, 0, u32::MAX as i128)? as u32))?;
            object.field_u32_array(tag, &values)?;
        }
        "u64[]" => {
            let values = scalars(node, |n| Ok(int(n, 0, u64::MAX as i128)? as u64))?;
            object.field_u64_array(tag, &values)?;
        }
        "bool[]" => {
            let values = scalars(node, bool_value)?;
            object.field_bool_array(tag, &values)?;
        }
        "f16[]" => {
            let values = scalars(node, |n| Ok(int(n, 0, u16::MAX as i128)? as u16))?;
            object.field_f16_array(tag, &values)?;
        }
        "f32[]" => {
            let values = scalars(node, |n| Ok(float(n)? as f32))?;
            object.field_f32_array(tag, &values)?;
        }
        "f64[]" => {
            let values = scalars(node, float)?;
            object.field_f64_array(tag, &values)?;
        }
        "str[]" => {
            let values: Vec<&str> =
                list_value(node)?.iter().map(str_value).collect::<Result<_>>()?;
            object.field_str_values(tag, &values)?;
        }
        "bin[]" => {
            let mut array = object.field_bytes_array(tag);
            for element in list_value(node)? {
                array.push(bytes_value(element)?)?;
            }
        }
        "obj[]" => {
            let mut array = object.field_object_array(tag);
            for element in list_value(node)? {
                let mut sub = array.element();
                emit_fields(&mut sub, object_value(element)?)?;
            }
        }
        "i8x2" => object.field_vector2_i8(tag, pair(node, |n| Ok(int(n, i8::MIN as i128, i8::MAX as i128)? as i8))?),
        "i16x2" => object.field_vector2_i16(tag, pair(node, |n| Ok(int(n, i16::MIN as i128, i16::MAX as i128)? as i16))?),
        "i32x2" => object.field_vector2_i32(tag, pair(node, |n| Ok(int(n, i32::MIN as i128, i32::MAX as i128)? as i32))?),
        "i64x2" => object.field_vector2_i64(tag, pair(node, |n| Ok(int(n, i64::MIN as i128, i64::MAX as i128)? as i64))?),
        "boolx2" => object.field_vector2_bool(tag, pair(node, bool_value)?),
        "f16x2" => object.field_vector2_f16(tag, pair(node, |n| Ok(int(n, 0, u16::MAX as i128)? as u16))?),
        "f32x2" => object.field_vector2_f32(tag, pair(node, |n| Ok(float(n)? as f32))?),
        "f64x2" => object.field_vector2_f64(tag, pair(node, float)?),
        "i8x3" => object.field_vector3_i8(tag, triple(node, |n| Ok(int(n, i8::MIN as i128, i8::MAX as i128)? as i8))?),
        "i16x3" => object.field_vector3_i16(tag, triple(node, |n| Ok(int(n, i16::MIN as i128, i16::MAX as i128)? as i16))?),
        "i32x3" => object.field_vector3_i32(tag, triple(node, |n| Ok(int(n, i32::MIN as i128, i32::MAX as i128)? as i32))?),
        "i64x3" => object.field_vector3_i64(tag, triple(node, |n| Ok(int(n, i64::MIN as i128, i64::MAX as i128)? as i64))?),
        "boolx3" => object.field_vector3_bool(tag, triple(node, bool_value)?),
        "f16x3" => object.field_vector3_f16(tag, triple(node, |n| Ok(int(n, 0, u16::MAX as i128)? as u16))?),
        "f32x3" => object.field_vector3_f32(tag, triple(node, |n| Ok(float(n)? as f32))?),
        "f64x3" => object.field_vector3_f64(tag, triple(node, float)?),
        "i8x4" => object.field_vector4_i8(tag, quad(node, |n| Ok(int(n, i8::MIN as i128, i8::MAX as i128)? as i8))?),
        "i16x4" => object.field_vector4_i16(tag, quad(node, |n| Ok(int(n, i16::MIN as i128, i16::MAX as i128)? as i16))?),
        "i32x4" => object.field_vector4_i32(tag, quad(node, |n| Ok(int(n, i32::MIN as i128, i32::MAX as i128)? as i32))?),
        "i64x4" => object.field_vector4_i64(tag, quad(node, |n| Ok(int(n, i64::MIN as i128, i64::MAX as i128)? as i64))?),
        "boolx4" => object.field_vector4_bool(tag, quad(node, bool_value)?),
        "f16x4" => object.field_vector4_f16(tag, quad(node, |n| Ok(int(n, 0, u16::MAX as i128)? as u16))?),
        "f32x4" => object.field_vector4_f32(tag, quad(node, |n| Ok(float(n)? as f32))?),
        "f64x4" => object.field_vector4_f64(tag, quad(node, float)?),
        other => bail!("unknown field type {:?}", other),
    }
    Ok(())
}

fn int(node: &Node, min: i128, max: i128) -> Result<i128> {
    match node {
        Node::Int(v) => {
            ensure!(*v >= min && *v <= max, "integer {} out of range", v);
            Ok(*v)
        }
        _ => bail!("expected an integer"),
    }
}

fn float(node: &Node) -> Result<f64> {
    match node {
        Node::Float(v) => Ok(*v),
        Node::Int(v) => Ok(*v as f64),
        _ => bail!("expected a number"),
    }
}

fn bool_value(node: &Node) -> Result<bool> {
    match node {
        Node::Bool(v) => Ok(*v),
        _ => bail!("expected true or false"),
    }
}

fn str_value(node: &Node) -> Result<&str> {
    match node {
        Node::Str(v) => Ok(v),
        _ => bail!("expected a string"),
    }
}

fn bytes_value(node: &Node) -> Result<&[u8]> {
    match node {
        Node::Bytes(v) => Ok(v),
        _ => bail!("expected a base64 literal"),
    }
}

fn uuid_value(node: &Node) -> Result<&[u8; 16]> {
    match node {
        Node::Uuid(v) => Ok(v),
        _ => bail!("expected a uuid"),
    }
}

fn object_value(node: &Node) -> Result<&[Field]> {
    match node {
        Node::Object(fields) => Ok(fields),
        _ => bail!("expected an object"),
    }
}

fn list_value(node: &Node) -> Result<&[Node]> {
    match node {
        Node::List(elements) => Ok(elements),
        _ => bail!("expected an array"),
    }
}

fn vector_value(node: &Node, dim: usize) -> Result<&[Node]> {
    match node {
        Node::Vector(elements) if elements.len() == dim => Ok(elements),
        Node::Vector(elements) => bail!("expected {} vector elements, got {}", dim, elements.len()),
        _ => bail!("expected a vector"),
    }
}

fn scalars<T>(node: &Node, convert: impl Fn(&Node) -> Result<T>) -> Result<Vec<T>> {
    list_value(node)?.iter().map(convert).collect()
}

fn pair<T>(node: &Node, convert: impl Fn(&Node) -> Result<T>) -> Result<[T; 2]> {
    let elements = vector_value(node, 2)?;
    Ok([convert(&elements[0])?, convert(&elements[1])?])
}

fn triple<T>(node: &Node, convert: impl Fn(&Node) -> Result<T>) -> Result<[T; 3]> {
    let elements = vector_value(node, 3)?;
    Ok([convert(&elements[0])?, convert(&elements[1])?, convert(&elements[2])?])
}

fn quad<T>(node: &Node, convert: impl Fn(&Node) -> Result<T>) -> Result<[T; 4]> {
    let elements = vector_value(node, 4)?;
    Ok([
        convert(&elements[0])?,
        convert(&elements[1])?,
        convert(&elements[2])?,
        convert(&elements[3])?,
    ])
}
