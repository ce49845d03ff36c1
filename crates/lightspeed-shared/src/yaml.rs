//! Utility functions for processing data in the YAML file format
use std::io::Write;

use serde::Serialize;
use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Represents every error which can be encountered during YAML serialization.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("failed to write YAML to stdout"))]
    WriteToStdout { source: std::io::Error },

    #[snafu(display("failed to parse bytes as valid UTF-8 string"))]
    ParseUtf8Bytes { source: std::string::FromUtf8Error },
}

/// Provides configurable options during YAML serialization.
///
/// For most people the default implementation [`SerializeOptions::default()`] is sufficient as it
/// enables explicit document and singleton map serialization.
#[derive(Clone, Copy, Debug)]
pub struct SerializeOptions {
    /// Adds leading triple dashes (`---`) to the output string.
    pub explicit_document: bool,

    /// Serialize enum variants as YAML maps using the variant name as the key.
    pub singleton_map: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            explicit_document: true,
            singleton_map: true,
        }
    }
}

/// Serializes any type `T` which is [serializable](serde::Serialize) as a YAML document using the
/// provided [`SerializeOptions`].
pub trait YamlDocument: Sized + Serialize {
    /// Generates the YAML document of `self`.
    fn to_yaml_document(&self, options: SerializeOptions) -> Result<String> {
        let mut buffer = Vec::new();
        serialize(self, &mut buffer, options)?;

        String::from_utf8(buffer).context(ParseUtf8BytesSnafu)
    }

    /// Generates and prints the YAML document of `self` to stdout.
    fn print_yaml_document(&self, options: SerializeOptions) -> Result<()> {
        let document = self.to_yaml_document(options)?;

        let mut writer = std::io::stdout().lock();
        writer
            .write_all(document.as_bytes())
            .context(WriteToStdoutSnafu)
    }
}

impl<T> YamlDocument for T where T: Serialize {}

/// Serializes the given data structure and writes it to a [`Writer`](Write).
pub fn serialize<T, W>(value: &T, mut writer: W, options: SerializeOptions) -> Result<()>
where
    T: Serialize,
    W: Write,
{
    if options.explicit_document {
        writer
            .write_all(b"---\n")
            .context(WriteDocumentSeparatorSnafu)?;
    }

    let mut serializer = serde_yaml::Serializer::new(writer);

    if options.singleton_map {
        serde_yaml::with::singleton_map_recursive::serialize(value, &mut serializer)
            .context(SerializeYamlSnafu)?;
    } else {
        value
            .serialize(&mut serializer)
            .context(SerializeYamlSnafu)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    enum Mode {
        Fixed { replicas: u16 },
    }

    #[derive(Serialize)]
    struct Config {
        name: &'static str,
        mode: Mode,
    }

    #[rstest]
    #[case(SerializeOptions::default(), "---\nname: demo\nmode:\n  fixed:\n    replicas: 2\n")]
    #[case(
        SerializeOptions { explicit_document: false, singleton_map: true },
        "name: demo\nmode:\n  fixed:\n    replicas: 2\n"
    )]
    #[case(
        SerializeOptions { explicit_document: false, singleton_map: false },
        "name: demo\nmode: !fixed\n  replicas: 2\n"
    )]
    fn serialize_with_options(#[case] options: SerializeOptions, #[case] expected: &str) {
        let config = Config {
            name: "demo",
            mode: Mode::Fixed { replicas: 2 },
        };

        let document = config.to_yaml_document(options).expect("must serialize");
        assert_eq!(document, expected);
    }
}
