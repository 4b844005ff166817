//! Encoders every [`Registry`](super::Registry) starts with.

use std::any::{type_name, Any};
use std::sync::Arc;

use bson::oid::ObjectId;
use bson::spec::BinarySubtype;
use bson::uuid::Uuid as BsonUuid;
use bson::{Binary, Bson, DateTime, Document, Regex, Timestamp};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::{typed_pair, EncodeContext, EncodeError, Encoder};

type EncodeFn<T> = fn(&T, &EncodeContext) -> Result<Bson, EncodeError>;

fn typed<T: Any>(f: EncodeFn<T>) -> [Arc<dyn Encoder>; 2] {
    typed_pair(f)
}

fn to_int64<T>(n: T) -> Result<Bson, EncodeError>
where
    T: TryInto<i64> + ToString + Copy,
{
    n.try_into().map(Bson::Int64).map_err(|_| EncodeError::Overflow {
        type_name: type_name::<T>(),
        value: n.to_string(),
    })
}

fn uuid_binary(uuid: BsonUuid, context: &EncodeContext) -> Result<Bson, EncodeError> {
    let representation = context.uuid_representation().ok_or_else(|| {
        EncodeError::Configuration(
            "uuid representation is unspecified; set one with \
             Registry::with_uuid_representation"
                .to_string(),
        )
    })?;
    Ok(Bson::Binary(Binary::from_uuid_with_representation(
        uuid,
        representation,
    )))
}

/// Structural conversion: JSON objects become documents, `$`-keys included.
fn json(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).map_or(Bson::Int64(i), Bson::Int32),
            None => n.as_f64().map_or(Bson::Null, Bson::Double),
        },
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json).collect()),
        Value::Object(map) => {
            let mut doc = Document::new();
            for (key, value) in map {
                doc.insert(key.clone(), json(value));
            }
            Bson::Document(doc)
        }
    }
}

pub(super) fn encoders() -> Vec<Arc<dyn Encoder>> {
    [
        // strings
        typed::<String>(|s, _| Ok(Bson::String(s.clone()))),
        typed::<&'static str>(|s, _| Ok(Bson::from(*s))),
        typed::<char>(|c, _| Ok(Bson::String(c.to_string()))),
        typed::<bool>(|b, _| Ok(Bson::Boolean(*b))),
        // integers
        typed::<i8>(|n, _| Ok(Bson::Int32(i32::from(*n)))),
        typed::<i16>(|n, _| Ok(Bson::Int32(i32::from(*n)))),
        typed::<i32>(|n, _| Ok(Bson::Int32(*n))),
        typed::<i64>(|n, _| Ok(Bson::Int64(*n))),
        typed::<isize>(|n, _| to_int64(*n)),
        typed::<u8>(|n, _| Ok(Bson::Int32(i32::from(*n)))),
        typed::<u16>(|n, _| Ok(Bson::Int32(i32::from(*n)))),
        typed::<u32>(|n, _| Ok(Bson::Int64(i64::from(*n)))),
        typed::<u64>(|n, _| to_int64(*n)),
        typed::<usize>(|n, _| to_int64(*n)),
        // floats
        typed::<f32>(|n, _| Ok(Bson::Double(f64::from(*n)))),
        typed::<f64>(|n, _| Ok(Bson::Double(*n))),
        // bson values
        typed::<Bson>(|v, _| Ok(v.clone())),
        typed::<Document>(|d, _| Ok(Bson::Document(d.clone()))),
        typed::<ObjectId>(|oid, _| Ok(Bson::ObjectId(*oid))),
        typed::<Binary>(|b, _| Ok(Bson::Binary(b.clone()))),
        typed::<DateTime>(|dt, _| Ok(Bson::DateTime(*dt))),
        typed::<Timestamp>(|ts, _| Ok(Bson::Timestamp(*ts))),
        typed::<Regex>(|re, _| Ok(Bson::RegularExpression(re.clone()))),
        typed::<BsonUuid>(|uuid, ctx| uuid_binary(*uuid, ctx)),
        // ecosystem types
        typed::<chrono::DateTime<Utc>>(|dt, _| {
            Ok(Bson::DateTime(DateTime::from_millis(dt.timestamp_millis())))
        }),
        typed::<Uuid>(|uuid, ctx| uuid_binary(BsonUuid::from_bytes(*uuid.as_bytes()), ctx)),
        typed::<Value>(|v, _| Ok(json(v))),
        // sequences
        typed::<Vec<u8>>(|bytes, _| {
            Ok(Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: bytes.clone(),
            }))
        }),
        typed::<Vec<Bson>>(|items, _| Ok(Bson::Array(items.clone()))),
        typed::<Vec<String>>(|items, _| Ok(Bson::Array(items.iter().cloned().map(Bson::String).collect()))),
        typed::<Vec<i32>>(|items, _| Ok(Bson::Array(items.iter().copied().map(Bson::Int32).collect()))),
        typed::<Vec<i64>>(|items, _| Ok(Bson::Array(items.iter().copied().map(Bson::Int64).collect()))),
        typed::<Vec<f64>>(|items, _| Ok(Bson::Array(items.iter().copied().map(Bson::Double).collect()))),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::super::{Registry, UuidRepresentation};
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn encode<T: Any>(value: T) -> Result<Bson, EncodeError> {
        Registry::new().encode_value(&value)
    }

    fn sample_uuid() -> Uuid {
        Uuid::from_bytes([
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ])
    }

    fn uuid_with(representation: UuidRepresentation) -> Binary {
        let encoded = Registry::new()
            .with_uuid_representation(representation)
            .encode_value(&sample_uuid())
            .unwrap();
        match encoded {
            Bson::Binary(binary) => binary,
            other => panic!("expected binary, found {other:?}"),
        }
    }

    #[test]
    fn integer_widths() {
        assert_eq!(encode(1i8).unwrap(), Bson::Int32(1));
        assert_eq!(encode(1u16).unwrap(), Bson::Int32(1));
        assert_eq!(encode(1i32).unwrap(), Bson::Int32(1));
        assert_eq!(encode(1i64).unwrap(), Bson::Int64(1));
        assert_eq!(encode(u32::MAX).unwrap(), Bson::Int64(i64::from(u32::MAX)));
        assert_eq!(encode(7usize).unwrap(), Bson::Int64(7));
    }

    #[test]
    fn u64_overflow() {
        let err = encode(u64::MAX).unwrap_err();
        match err {
            EncodeError::Overflow { type_name, value } => {
                assert_eq!(type_name, "u64");
                assert_eq!(value, u64::MAX.to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn strings_and_chars() {
        assert_eq!(encode("k1").unwrap(), Bson::from("k1"));
        assert_eq!(encode(String::from("k1")).unwrap(), Bson::from("k1"));
        assert_eq!(encode('x').unwrap(), Bson::from("x"));
    }

    #[test]
    fn floats() {
        assert_eq!(encode(1.5f32).unwrap(), Bson::Double(1.5));
        assert_eq!(encode(2.5f64).unwrap(), Bson::Double(2.5));
    }

    #[test]
    fn options_of_builtins() {
        assert_eq!(encode(None::<f64>).unwrap(), Bson::Null);
        assert_eq!(encode(Some(2.5f64)).unwrap(), Bson::Double(2.5));
        assert_eq!(encode(Some("k")).unwrap(), Bson::from("k"));
        assert!(matches!(
            encode(Some(u64::MAX)),
            Err(EncodeError::Overflow { .. })
        ));
    }

    #[test]
    fn chrono_datetime() {
        let dt = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(
            encode(dt).unwrap(),
            Bson::DateTime(DateTime::from_millis(1_700_000_000_000))
        );
    }

    #[test]
    fn uuid_needs_a_representation() {
        assert!(matches!(
            Registry::new().encode_value(&sample_uuid()),
            Err(EncodeError::Configuration(_))
        ));
    }

    #[test]
    fn uuid_standard_layout() {
        let binary = uuid_with(UuidRepresentation::Standard);
        assert_eq!(binary.subtype, BinarySubtype::Uuid);
        assert_eq!(binary.bytes, sample_uuid().as_bytes().to_vec());
    }

    #[test]
    fn uuid_legacy_layouts() {
        let java = uuid_with(UuidRepresentation::JavaLegacy);
        assert_eq!(java.subtype, BinarySubtype::UuidOld);
        assert_eq!(&java.bytes[..8], &[0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);

        let csharp = uuid_with(UuidRepresentation::CSharpLegacy);
        assert_eq!(csharp.subtype, BinarySubtype::UuidOld);
        assert_eq!(&csharp.bytes[..8], &[0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66]);

        let python = uuid_with(UuidRepresentation::PythonLegacy);
        assert_eq!(python.subtype, BinarySubtype::UuidOld);
        assert_eq!(python.bytes, sample_uuid().as_bytes().to_vec());
    }

    #[test]
    fn uuid_layouts_read_back() {
        let expected = BsonUuid::from_bytes(*sample_uuid().as_bytes());
        for representation in [
            UuidRepresentation::Standard,
            UuidRepresentation::JavaLegacy,
            UuidRepresentation::CSharpLegacy,
            UuidRepresentation::PythonLegacy,
        ] {
            let binary = uuid_with(representation);
            assert_eq!(
                binary.to_uuid_with_representation(representation).unwrap(),
                expected
            );
        }
    }

    #[test]
    fn json_values_convert_structurally() {
        let encoded = encode(json!({"a": [1, "two", null], "$b": 3000000000i64, "c": 0.5})).unwrap();
        let doc = encoded.as_document().unwrap();
        assert_eq!(
            doc.get_array("a").unwrap(),
            &vec![Bson::Int32(1), Bson::from("two"), Bson::Null]
        );
        assert_eq!(doc.get_i64("$b").unwrap(), 3_000_000_000);
        assert_eq!(doc.get_f64("c").unwrap(), 0.5);
    }

    #[test]
    fn sequences() {
        assert_eq!(
            encode(vec![1i64, 2]).unwrap(),
            Bson::Array(vec![Bson::Int64(1), Bson::Int64(2)])
        );
        assert_eq!(
            encode(vec!["a".to_string()]).unwrap(),
            Bson::Array(vec![Bson::from("a")])
        );
        assert_eq!(
            encode(vec![0xdeu8, 0xad]).unwrap(),
            Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: vec![0xde, 0xad],
            })
        );
    }

    #[test]
    fn unlisted_sequence_is_unsupported() {
        assert!(matches!(
            encode(vec![true]),
            Err(EncodeError::UnsupportedType { .. })
        ));
    }
}
