use std::fs;
use std::path::PathBuf;

use crate::parser::gc_record::FieldType;

const FORMAT: &[u8] = b"JAVA PROFILE 1.0.2\0";
const TIMESTAMP: u64 = 1_608_192_273_831;

fn push_id(buffer: &mut Vec<u8>, id_size: u32, id: u64) {
    if id_size == 4 {
        buffer.extend_from_slice(&(id as u32).to_be_bytes());
    } else {
        buffer.extend_from_slice(&id.to_be_bytes());
    }
}

/// Writes synthetic hprof files record by record.
pub struct HprofBuilder {
    id_size: u32,
    bytes: Vec<u8>,
}

impl HprofBuilder {
    pub fn new(id_size: u32) -> Self {
        let mut bytes = FORMAT.to_vec();
        bytes.extend_from_slice(&id_size.to_be_bytes());
        bytes.extend_from_slice(&TIMESTAMP.to_be_bytes());
        HprofBuilder { id_size, bytes }
    }

    pub fn raw_record(mut self, tag: u8, body: &[u8]) -> Self {
        self.bytes.push(tag);
        self.bytes.extend_from_slice(&0u32.to_be_bytes());
        self.bytes
            .extend_from_slice(&(body.len() as u32).to_be_bytes());
        self.bytes.extend_from_slice(body);
        self
    }

    pub fn string_bytes(self, id: u64, content: &[u8]) -> Self {
        let mut body = Vec::new();
        push_id(&mut body, self.id_size, id);
        body.extend_from_slice(content);
        self.raw_record(0x01, &body)
    }

    pub fn string(self, id: u64, content: &str) -> Self {
        self.string_bytes(id, content.as_bytes())
    }

    pub fn load_class(self, serial_number: u32, class_object_id: u64, class_name_id: u64) -> Self {
        let mut body = serial_number.to_be_bytes().to_vec();
        push_id(&mut body, self.id_size, class_object_id);
        body.extend_from_slice(&0u32.to_be_bytes());
        push_id(&mut body, self.id_size, class_name_id);
        self.raw_record(0x02, &body)
    }

    pub fn heap_dump(self, body: &[u8]) -> Self {
        self.raw_record(0x0C, body)
    }

    pub fn heap_dump_segment(self, body: &[u8]) -> Self {
        self.raw_record(0x1C, body)
    }

    pub fn heap_dump_end(self) -> Self {
        self.raw_record(0x2C, &[])
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_temp_file(self, name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "hprof-histo-{}-{name}.hprof",
            std::process::id()
        ));
        fs::write(&path, self.bytes).expect("temp file should be writable");
        path
    }
}

/// Writes the sub-records of a heap dump (segment) body.
pub struct GcSegmentBuilder {
    id_size: u32,
    bytes: Vec<u8>,
}

impl GcSegmentBuilder {
    pub fn new(id_size: u32) -> Self {
        GcSegmentBuilder {
            id_size,
            bytes: Vec::new(),
        }
    }

    fn id(&mut self, id: u64) {
        push_id(&mut self.bytes, self.id_size, id);
    }

    fn u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    fn u16(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn root_unknown(mut self, object_id: u64) -> Self {
        self.bytes.push(0xFF);
        self.id(object_id);
        self
    }

    pub fn root_sticky_class(mut self, object_id: u64) -> Self {
        self.bytes.push(0x05);
        self.id(object_id);
        self
    }

    pub fn root_java_frame(mut self, object_id: u64) -> Self {
        self.bytes.push(0x03);
        self.id(object_id);
        self.u32(1);
        self.u32(2);
        self
    }

    pub fn root_jni_global(mut self, object_id: u64) -> Self {
        self.bytes.push(0x01);
        self.id(object_id);
        self.id(object_id + 1);
        self
    }

    /// Class dump with one constant pool entry, one static int and the given instance fields.
    pub fn class_dump(
        mut self,
        class_object_id: u64,
        super_class_object_id: u64,
        instance_fields: &[FieldType],
    ) -> Self {
        self.bytes.push(0x20);
        self.id(class_object_id);
        self.u32(0);
        self.id(super_class_object_id);
        for _ in 0..5 {
            // class loader, signers, protection domain, reserved x2
            self.id(0);
        }
        let instance_size: u64 = instance_fields
            .iter()
            .map(|ft| ft.byte_size(self.id_size))
            .sum();
        self.u32(instance_size as u32);
        // constant pool: one long
        self.u16(1);
        self.u16(0);
        self.bytes.push(FieldType::Long as u8);
        self.bytes.extend_from_slice(&42i64.to_be_bytes());
        // static fields: one int
        self.u16(1);
        self.id(999);
        self.bytes.push(FieldType::Int as u8);
        self.u32(7);
        // instance fields
        self.u16(instance_fields.len() as u16);
        for (index, field_type) in instance_fields.iter().enumerate() {
            self.id(1000 + index as u64);
            self.bytes.push(*field_type as u8);
        }
        self
    }

    pub fn instance_dump(mut self, object_id: u64, class_object_id: u64, fields: &[u8]) -> Self {
        self.bytes.push(0x21);
        self.id(object_id);
        self.u32(0);
        self.id(class_object_id);
        self.u32(fields.len() as u32);
        self.bytes.extend_from_slice(fields);
        self
    }

    pub fn object_array_dump(
        mut self,
        object_id: u64,
        array_class_id: u64,
        number_of_elements: u32,
    ) -> Self {
        self.bytes.push(0x22);
        self.id(object_id);
        self.u32(0);
        self.u32(number_of_elements);
        self.id(array_class_id);
        for element in 0..number_of_elements {
            self.id(u64::from(element));
        }
        self
    }

    pub fn primitive_array_dump(
        mut self,
        object_id: u64,
        element_type: FieldType,
        number_of_elements: u32,
    ) -> Self {
        self.bytes.push(0x23);
        self.id(object_id);
        self.u32(0);
        self.u32(number_of_elements);
        self.bytes.push(element_type as u8);
        let data_len = u64::from(number_of_elements) * element_type.byte_size(self.id_size);
        self.bytes.resize(self.bytes.len() + data_len as usize, 0);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}
