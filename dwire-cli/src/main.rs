use bstr::ByteSlice;
use clap::{Parser, Subcommand};
use eyre::{bail, eyre, Result, WrapErr};
use std::fs;
use std::path::PathBuf;

use dwire_core::signature::Kind;
use dwire_core::value::Value;
use dwire_core::{MessageWriter, ObjectPath, Signature, VecBuffer};

#[derive(Parser)]
#[command(name = "dwire")]
#[command(about = "Wire-format marshaling tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a type signature
    Check {
        /// Signature string, e.g. "a{sv}"
        signature: String,
    },
    /// Encode a JSON-described value to wire bytes
    Encode {
        /// Input JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Signature describing the value, e.g. "(is)"
        #[arg(short, long)]
        signature: String,

        /// Output file for the wire bytes
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Encode a JSON-described value and hex-dump the wire bytes
    Dump {
        /// Input JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Signature describing the value
        #[arg(short, long)]
        signature: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { signature } => check_signature(&signature),
        Commands::Encode {
            input,
            signature,
            output,
        } => {
            let bytes = encode_file(&input, &signature)?;
            fs::write(&output, &bytes)
                .wrap_err_with(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} bytes to {}", bytes.len(), output.display());
            Ok(())
        }
        Commands::Dump { input, signature } => {
            let bytes = encode_file(&input, &signature)?;
            hex_dump(&bytes);
            println!("{} bytes total", bytes.len());
            Ok(())
        }
    }
}

fn check_signature(signature: &str) -> Result<()> {
    let sig = Signature::new(signature)
        .map_err(|e| eyre!("Invalid signature {signature:?}: {e}"))?;
    println!("Signature: {sig}");
    println!("Bytes: {}", sig.len());
    if !sig.is_empty() {
        println!("Leading type: {:?}", sig.first_type_kind());
        println!("Leading alignment: {}", sig.first_type_alignment());
    }
    Ok(())
}

fn encode_file(input: &PathBuf, signature: &str) -> Result<Vec<u8>> {
    let sig = Signature::single(signature)
        .map_err(|e| eyre!("Invalid signature {signature:?}: {e}"))?;
    let text = fs::read_to_string(input)
        .wrap_err_with(|| format!("Failed to read {}", input.display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).wrap_err("Input is not valid JSON")?;

    let value = json_to_value(sig.as_str(), &json)?;
    let mut buf = VecBuffer::new();
    let mut writer = MessageWriter::new(&mut buf);
    writer
        .write_value(&value)
        .map_err(|e| eyre!("Serialization failed: {e}"))?;
    Ok(buf.into_bytes())
}

/// Build a value tree from JSON, directed by a signature.
///
/// JSON carries less type information than the wire format, so the signature
/// decides how each JSON node is read: numbers become the signed/unsigned
/// width the signature names, arrays become arrays or structs, dictionaries
/// are arrays of `[key, value]` pairs, and variants are
/// `{"signature": .., "value": ..}` objects.
fn json_to_value(sig: &str, json: &serde_json::Value) -> Result<Value> {
    let bytes = sig.as_bytes();
    match bytes[0] {
        b'y' => Ok(Value::Byte(u8::try_from(expect_u64(sig, json)?)?)),
        b'b' => match json {
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            other => bail!("Expected a boolean for 'b', got {other}"),
        },
        b'n' => Ok(Value::Int16(i16::try_from(expect_i64(sig, json)?)?)),
        b'q' => Ok(Value::UInt16(u16::try_from(expect_u64(sig, json)?)?)),
        b'i' => Ok(Value::Int32(i32::try_from(expect_i64(sig, json)?)?)),
        b'u' => Ok(Value::UInt32(u32::try_from(expect_u64(sig, json)?)?)),
        b'x' => Ok(Value::Int64(expect_i64(sig, json)?)),
        b't' => Ok(Value::UInt64(expect_u64(sig, json)?)),
        b'd' => json
            .as_f64()
            .map(Value::Double)
            .ok_or_else(|| eyre!("Expected a number for 'd', got {json}")),
        b's' => Ok(Value::from(expect_str(sig, json)?)),
        b'o' => {
            let path = ObjectPath::new(expect_str(sig, json)?)
                .map_err(|e| eyre!("{e}"))?;
            Ok(Value::ObjectPath(path))
        }
        b'g' => {
            let inner = Signature::new(expect_str(sig, json)?)
                .map_err(|e| eyre!("{e}"))?;
            Ok(Value::Signature(inner))
        }
        b'h' => Ok(Value::unix_fd(u32::try_from(expect_u64(sig, json)?)?)),
        b'v' => {
            let obj = json
                .as_object()
                .ok_or_else(|| eyre!("Expected {{\"signature\", \"value\"}} for 'v'"))?;
            let inner_sig = obj
                .get("signature")
                .and_then(|s| s.as_str())
                .ok_or_else(|| eyre!("Variant object needs a \"signature\" string"))?;
            let inner_json = obj
                .get("value")
                .ok_or_else(|| eyre!("Variant object needs a \"value\""))?;
            Signature::single(inner_sig).map_err(|e| eyre!("{e}"))?;
            Ok(Value::variant(json_to_value(inner_sig, inner_json)?))
        }
        b'a' if bytes.get(1) == Some(&b'{') => {
            let key_sig = &sig[2..3];
            let value_sig = &sig[3..sig.len() - 1];
            let pairs = json
                .as_array()
                .ok_or_else(|| eyre!("Expected an array of [key, value] pairs for {sig}"))?;
            let mut entries = Vec::with_capacity(pairs.len());
            for pair in pairs {
                let pair = pair
                    .as_array()
                    .filter(|p| p.len() == 2)
                    .ok_or_else(|| eyre!("Dictionary entries must be [key, value] pairs"))?;
                entries.push((
                    json_to_value(key_sig, &pair[0])?,
                    json_to_value(value_sig, &pair[1])?,
                ));
            }
            let key_kind = Kind::from_code(key_sig.as_bytes()[0]);
            let value_signature = Signature::single(value_sig).map_err(|e| eyre!("{e}"))?;
            Value::dictionary(key_kind, value_signature, entries).map_err(|e| eyre!("{e}"))
        }
        b'a' => {
            let item_sig = &sig[1..];
            let items = json
                .as_array()
                .ok_or_else(|| eyre!("Expected a JSON array for {sig}"))?
                .iter()
                .map(|item| json_to_value(item_sig, item))
                .collect::<Result<Vec<_>>>()?;
            let item_signature = Signature::single(item_sig).map_err(|e| eyre!("{e}"))?;
            Value::array_with_signature(item_signature, items).map_err(|e| eyre!("{e}"))
        }
        b'(' => {
            let field_sigs = split_struct_fields(&sig[1..sig.len() - 1]);
            let fields_json = json
                .as_array()
                .ok_or_else(|| eyre!("Expected a JSON array of fields for {sig}"))?;
            if fields_json.len() != field_sigs.len() {
                bail!(
                    "Struct {sig} has {} fields, input has {}",
                    field_sigs.len(),
                    fields_json.len()
                );
            }
            let fields = field_sigs
                .iter()
                .zip(fields_json)
                .map(|(field_sig, field_json)| json_to_value(field_sig, field_json))
                .collect::<Result<Vec<_>>>()?;
            Value::structure(fields).map_err(|e| eyre!("{e}"))
        }
        other => bail!("Unhandled signature code {:?}", other as char),
    }
}

fn expect_u64(sig: &str, json: &serde_json::Value) -> Result<u64> {
    json.as_u64()
        .ok_or_else(|| eyre!("Expected an unsigned number for {sig:?}, got {json}"))
}

fn expect_i64(sig: &str, json: &serde_json::Value) -> Result<i64> {
    json.as_i64()
        .ok_or_else(|| eyre!("Expected an integer for {sig:?}, got {json}"))
}

fn expect_str<'j>(sig: &str, json: &'j serde_json::Value) -> Result<&'j str> {
    json.as_str()
        .ok_or_else(|| eyre!("Expected a string for {sig:?}, got {json}"))
}

/// Split a struct body signature into one signature per field.
fn split_struct_fields(body: &str) -> Vec<String> {
    let bytes = body.as_bytes();
    let mut fields = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let len = complete_type_len(bytes, pos);
        fields.push(body[pos..pos + len].to_string());
        pos += len;
    }
    fields
}

fn complete_type_len(bytes: &[u8], pos: usize) -> usize {
    match bytes[pos] {
        b'a' => {
            if bytes.get(pos + 1) == Some(&b'{') {
                4 + complete_type_len(bytes, pos + 3)
            } else {
                1 + complete_type_len(bytes, pos + 1)
            }
        }
        b'(' => {
            let mut inner = pos + 1;
            while bytes[inner] != b')' {
                inner += complete_type_len(bytes, inner);
            }
            inner + 1 - pos
        }
        _ => 1,
    }
}

fn hex_dump(bytes: &[u8]) {
    for line in dump_lines(bytes) {
        println!("{line}");
    }
}

/// Render 16 bytes per line: offset, hex columns, printable-byte gutter.
fn dump_lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(row, chunk)| {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            let gutter: Vec<u8> = chunk
                .iter()
                .map(|&b| {
                    if b.is_ascii_graphic() || b == b' ' {
                        b
                    } else {
                        b'.'
                    }
                })
                .collect();
            format!(
                "{:08x}  {:<47}  |{}|",
                row * 16,
                hex.join(" "),
                gutter.as_bstr()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_to_value_scalar_widths() {
        let value = json_to_value("i", &serde_json::json!(-5)).unwrap();
        assert_eq!(value, Value::Int32(-5));

        assert!(json_to_value("y", &serde_json::json!(300)).is_err());
        assert!(json_to_value("u", &serde_json::json!(-1)).is_err());
    }

    #[test]
    fn test_json_to_value_containers() {
        let value = json_to_value("ai", &serde_json::json!([1, 2, 3])).unwrap();
        assert_eq!(value.count(), 3);
        assert_eq!(value.signature().as_str(), "ai");

        let value = json_to_value("(is)", &serde_json::json!([1, "one"])).unwrap();
        assert_eq!(value.signature().as_str(), "(is)");

        let value =
            json_to_value("a{ys}", &serde_json::json!([[1, "one"], [2, "two"]])).unwrap();
        assert_eq!(value.signature().as_str(), "a{ys}");
        assert_eq!(value.count(), 2);
    }

    #[test]
    fn test_json_to_value_variant() {
        let value = json_to_value(
            "v",
            &serde_json::json!({"signature": "s", "value": "boxed"}),
        )
        .unwrap();
        assert_eq!(value.signature().as_str(), "v");
        assert_eq!(value.as_str().unwrap(), "boxed");
    }

    #[test]
    fn test_dump_lines_layout() {
        let lines = dump_lines(&[3, 0, 0, 0, b'f', b'o', b'o', 0]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("00000000  03 00 00 00 66 6f 6f 00"));
        assert!(lines[0].ends_with("|....foo.|"));

        let lines = dump_lines(&[0u8; 20]);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("00000010"));
    }

    #[test]
    fn test_split_struct_fields() {
        assert_eq!(split_struct_fields("is"), vec!["i", "s"]);
        assert_eq!(
            split_struct_fields("a{ys}(i(u))x"),
            vec!["a{ys}", "(i(u))", "x"]
        );
    }
}
