use crate::errors::HprofHistoError;
use crate::parser::gc_record::GcRecord::{
    ClassDump, InstanceDump, ObjectArrayDump, PrimitiveArrayDump, Root,
};
use crate::parser::gc_record::*;
use crate::parser::primitive_parsers::*;
use crate::parser::record::{LoadClassData, Utf8StringData};
use nom::combinator::{map, map_opt};
use nom::error::{Error, ErrorKind};
use nom::multi::count;
use nom::{IResult, Parser};

const TAG_GC_ROOT_UNKNOWN: u8 = 0xFF;
const TAG_GC_ROOT_JNI_GLOBAL: u8 = 0x01;
const TAG_GC_ROOT_JNI_LOCAL: u8 = 0x02;
const TAG_GC_ROOT_JAVA_FRAME: u8 = 0x03;
const TAG_GC_ROOT_NATIVE_STACK: u8 = 0x04;
const TAG_GC_ROOT_STICKY_CLASS: u8 = 0x05;
const TAG_GC_ROOT_THREAD_BLOCK: u8 = 0x06;
const TAG_GC_ROOT_MONITOR_USED: u8 = 0x07;
const TAG_GC_ROOT_THREAD_OBJ: u8 = 0x08;
const TAG_GC_CLASS_DUMP: u8 = 0x20;
const TAG_GC_INSTANCE_DUMP: u8 = 0x21;
const TAG_GC_OBJ_ARRAY_DUMP: u8 = 0x22;
const TAG_GC_PRIM_ARRAY_DUMP: u8 = 0x23;

pub const CONTENT_OVERRUN: &str = "content exceeds the declared record length";

/// The whole body after the identifier is the string content.
pub fn parse_utf8_string(i: &[u8], id_size: u32) -> IResult<&[u8], Utf8StringData<'_>> {
    let (bytes, id) = parse_id(id_size)(i)?;
    Ok((&bytes[bytes.len()..], Utf8StringData { id, bytes }))
}

pub fn parse_load_class(i: &[u8], id_size: u32) -> IResult<&[u8], LoadClassData> {
    map(
        (parse_u32, parse_id(id_size), parse_u32, parse_id(id_size)),
        |(_serial_number, class_object_id, _stack_trace_serial_number, class_name_id)| {
            LoadClassData {
                class_object_id,
                class_name_id,
            }
        },
    )
    .parse(i)
}

/// Turns a parser outcome on a complete record body into the crate error type.
pub fn record_result<O>(
    body_offset: u64,
    body: &[u8],
    res: IResult<&[u8], O>,
) -> Result<O, HprofHistoError> {
    res.map(|(_, o)| o)
        .map_err(|e| parse_error(body_offset, body, &e))
}

/// Locates a parsing failure on `input`, which starts at stream offset `input_offset`.
pub fn parse_error(
    input_offset: u64,
    input: &[u8],
    e: &nom::Err<Error<&[u8]>>,
) -> HprofHistoError {
    let position = match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => input.len() - e.input.len(),
        nom::Err::Incomplete(_) => input.len(),
    };
    HprofHistoError::InvalidRecord {
        offset: input_offset + position as u64,
        message: nom_error_message(e),
    }
}

fn nom_error_message(e: &nom::Err<Error<&[u8]>>) -> String {
    match e {
        nom::Err::Incomplete(_) => CONTENT_OVERRUN.to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => match e.code {
            ErrorKind::Tag => match e.input.first() {
                Some(tag) => format!("unhandled heap dump sub-record tag {tag:#04x}"),
                None => "missing heap dump sub-record tag".to_string(),
            },
            ErrorKind::MapOpt => "unknown field type".to_string(),
            ErrorKind::Verify => "object type in primitive array".to_string(),
            kind => format!("{kind:?}"),
        },
    }
}

/// Decodes the next heap dump sub-record, leaving the content of instances and arrays unread.
pub fn parse_gc_record(i: &[u8], id_size: u32) -> IResult<&[u8], GcRecord> {
    let (r1, tag) = parse_u8(i)?;
    match tag {
        TAG_GC_ROOT_UNKNOWN => skip_gc_root(r1, id_size, 0, 0),
        TAG_GC_ROOT_JNI_GLOBAL => skip_gc_root(r1, id_size, 1, 0),
        TAG_GC_ROOT_JNI_LOCAL => skip_gc_root(r1, id_size, 0, 2),
        TAG_GC_ROOT_JAVA_FRAME => skip_gc_root(r1, id_size, 0, 2),
        TAG_GC_ROOT_NATIVE_STACK => skip_gc_root(r1, id_size, 0, 1),
        TAG_GC_ROOT_STICKY_CLASS => skip_gc_root(r1, id_size, 0, 0),
        TAG_GC_ROOT_THREAD_BLOCK => skip_gc_root(r1, id_size, 0, 1),
        TAG_GC_ROOT_MONITOR_USED => skip_gc_root(r1, id_size, 0, 0),
        TAG_GC_ROOT_THREAD_OBJ => skip_gc_root(r1, id_size, 0, 2),
        TAG_GC_CLASS_DUMP => parse_gc_class_dump(r1, id_size),
        TAG_GC_INSTANCE_DUMP => parse_gc_instance_dump(r1, id_size),
        TAG_GC_OBJ_ARRAY_DUMP => parse_gc_object_array_dump(r1, id_size),
        TAG_GC_PRIM_ARRAY_DUMP => parse_gc_primitive_array_dump(r1, id_size),
        _ => Err(nom::Err::Failure(Error::new(i, ErrorKind::Tag))),
    }
}

// GC roots: the object id, then extra ids and u32 serials
fn skip_gc_root(
    i: &[u8],
    id_size: u32,
    extra_ids: usize,
    extra_u32s: usize,
) -> IResult<&[u8], GcRecord> {
    let root_len = (1 + extra_ids) * id_size as usize + extra_u32s * 4;
    map(take_bytes(root_len), |_| Root).parse(i)
}

fn parse_field_type(i: &[u8]) -> IResult<&[u8], FieldType> {
    map_opt(parse_i8, FieldType::from_value).parse(i)
}

fn skip_field_value(field_type: FieldType, id_size: u32) -> impl Fn(&[u8]) -> IResult<&[u8], ()> {
    move |i: &[u8]| map(take_bytes(field_type.byte_size(id_size) as usize), |_| ()).parse(i)
}

fn skip_const_pool_item(id_size: u32) -> impl Fn(&[u8]) -> IResult<&[u8], ()> {
    move |i: &[u8]| {
        let (r1, (_const_pool_idx, const_type)) = (parse_u16, parse_field_type).parse(i)?;
        skip_field_value(const_type, id_size)(r1)
    }
}

fn skip_static_field_item(id_size: u32) -> impl Fn(&[u8]) -> IResult<&[u8], ()> {
    move |i: &[u8]| {
        let (r1, (_name_id, field_type)) = (parse_id(id_size), parse_field_type).parse(i)?;
        skip_field_value(field_type, id_size)(r1)
    }
}

fn parse_instance_field_type(id_size: u32) -> impl Fn(&[u8]) -> IResult<&[u8], FieldType> {
    move |i: &[u8]| {
        map((parse_id(id_size), parse_field_type), |(_name_id, field_type)| field_type).parse(i)
    }
}

fn parse_gc_class_dump(i: &[u8], id_size: u32) -> IResult<&[u8], GcRecord> {
    let (r1, (class_object_id, _stack_trace_serial_number, super_class_object_id)) =
        (parse_id(id_size), parse_u32, parse_id(id_size)).parse(i)?;
    // class loader, signers, protection domain, two reserved ids, then the instance size
    let (r2, _) = take_bytes(5 * id_size as usize + 4)(r1)?;
    let (r3, constant_pool_size) = parse_u16(r2)?;
    let (r4, _) = count(skip_const_pool_item(id_size), constant_pool_size as usize).parse(r3)?;
    let (r5, static_fields) = parse_u16(r4)?;
    let (r6, _) = count(skip_static_field_item(id_size), static_fields as usize).parse(r5)?;
    let (r7, instance_field_number) = parse_u16(r6)?;
    let (r8, instance_fields) = count(
        parse_instance_field_type(id_size),
        instance_field_number as usize,
    )
    .parse(r7)?;
    Ok((
        r8,
        ClassDump {
            class_object_id,
            super_class_object_id,
            instance_fields,
        },
    ))
}

fn parse_gc_instance_dump(i: &[u8], id_size: u32) -> IResult<&[u8], GcRecord> {
    map(
        (parse_id(id_size), parse_u32, parse_id(id_size), parse_u32),
        |(_object_id, _stack_trace_serial_number, class_object_id, data_size)| InstanceDump {
            class_object_id,
            data_size,
        },
    )
    .parse(i)
}

fn parse_gc_object_array_dump(i: &[u8], id_size: u32) -> IResult<&[u8], GcRecord> {
    map(
        (parse_id(id_size), parse_u32, parse_u32, parse_id(id_size)),
        |(_object_id, _stack_trace_serial_number, number_of_elements, array_class_id)| {
            ObjectArrayDump {
                number_of_elements,
                array_class_id,
            }
        },
    )
    .parse(i)
}

fn parse_gc_primitive_array_dump(i: &[u8], id_size: u32) -> IResult<&[u8], GcRecord> {
    let (r1, (_object_id, _stack_trace_serial_number, number_of_elements)) =
        (parse_id(id_size), parse_u32, parse_u32).parse(i)?;
    let (r2, element_type) = parse_field_type(r1)?;
    if element_type == FieldType::Object {
        return Err(nom::Err::Failure(Error::new(r1, ErrorKind::Verify)));
    }
    Ok((
        r2,
        PrimitiveArrayDump {
            number_of_elements,
            element_type,
        },
    ))
}
