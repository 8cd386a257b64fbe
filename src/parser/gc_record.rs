#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FieldType {
    Object = 2,
    Bool = 4,
    Char = 5,
    Float = 6,
    Double = 7,
    Byte = 8,
    Short = 9,
    Int = 10,
    Long = 11,
}

impl FieldType {
    pub fn from_value(v: i8) -> Option<FieldType> {
        match v {
            2 => Some(FieldType::Object),
            4 => Some(FieldType::Bool),
            5 => Some(FieldType::Char),
            6 => Some(FieldType::Float),
            7 => Some(FieldType::Double),
            8 => Some(FieldType::Byte),
            9 => Some(FieldType::Short),
            10 => Some(FieldType::Int),
            11 => Some(FieldType::Long),
            _ => None,
        }
    }

    /// Width of a value of this type; references take the identifier width of the dump.
    pub fn byte_size(self, id_size: u32) -> u64 {
        match self {
            FieldType::Byte | FieldType::Bool => 1,
            FieldType::Char | FieldType::Short => 2,
            FieldType::Float | FieldType::Int => 4,
            FieldType::Double | FieldType::Long => 8,
            FieldType::Object => u64::from(id_size),
        }
    }

    pub fn java_name(self) -> &'static str {
        match self {
            FieldType::Object => "java.lang.Object",
            FieldType::Bool => "boolean",
            FieldType::Char => "char",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Byte => "byte",
            FieldType::Short => "short",
            FieldType::Int => "int",
            FieldType::Long => "long",
        }
    }
}

/// Heap dump sub-record, reduced to what a shallow histogram needs.
///
/// Instances and arrays are decoded up to their content, the content length is given by
/// `content_len` and stays in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcRecord {
    Root,
    ClassDump {
        class_object_id: u64,
        super_class_object_id: u64,
        instance_fields: Vec<FieldType>,
    },
    InstanceDump {
        class_object_id: u64,
        data_size: u32,
    },
    ObjectArrayDump {
        number_of_elements: u32,
        array_class_id: u64,
    },
    PrimitiveArrayDump {
        number_of_elements: u32,
        element_type: FieldType,
    },
}

impl GcRecord {
    /// Number of bytes following the decoded part of the sub-record.
    pub fn content_len(&self, id_size: u32) -> u64 {
        match self {
            GcRecord::Root | GcRecord::ClassDump { .. } => 0,
            GcRecord::InstanceDump { data_size, .. } => u64::from(*data_size),
            GcRecord::ObjectArrayDump {
                number_of_elements, ..
            } => u64::from(*number_of_elements) * u64::from(id_size),
            GcRecord::PrimitiveArrayDump {
                number_of_elements,
                element_type,
            } => u64::from(*number_of_elements) * element_type.byte_size(id_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_widths() {
        let widths: Vec<_> = [
            FieldType::Bool,
            FieldType::Byte,
            FieldType::Char,
            FieldType::Short,
            FieldType::Int,
            FieldType::Long,
            FieldType::Float,
            FieldType::Double,
        ]
        .iter()
        .map(|ft| ft.byte_size(8))
        .collect();
        assert_eq!(widths, vec![1, 1, 2, 2, 4, 8, 4, 8]);
    }

    #[test]
    fn reference_width_follows_identifier_size() {
        assert_eq!(FieldType::Object.byte_size(4), 4);
        assert_eq!(FieldType::Object.byte_size(8), 8);
    }

    #[test]
    fn content_left_in_the_stream() {
        let instance = GcRecord::InstanceDump {
            class_object_id: 1,
            data_size: 24,
        };
        assert_eq!(instance.content_len(8), 24);
        let objects = GcRecord::ObjectArrayDump {
            number_of_elements: 10,
            array_class_id: 2,
        };
        assert_eq!(objects.content_len(4), 40);
        assert_eq!(objects.content_len(8), 80);
        let longs = GcRecord::PrimitiveArrayDump {
            number_of_elements: 3,
            element_type: FieldType::Long,
        };
        assert_eq!(longs.content_len(4), 24);
        assert_eq!(GcRecord::Root.content_len(8), 0);
    }

    #[test]
    fn unknown_type_code() {
        assert_eq!(FieldType::from_value(10), Some(FieldType::Int));
        assert_eq!(FieldType::from_value(3), None);
        assert_eq!(FieldType::from_value(-1), None);
    }
}
