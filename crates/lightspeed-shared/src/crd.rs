use snafu::{ResultExt, Snafu};

use crate::yaml::{SerializeOptions, YamlDocument};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to write CRD YAML schema to stdout"))]
    WriteToStdout { source: crate::yaml::Error },
}

/// Prints the `CustomResourceDefinition` of Kubernetes custom resources as YAML.
///
/// The printed YAML string is always an explicit document with leading dashes (`---`), so that
/// multiple schemas can be concatenated into a single manifest.
pub trait CustomResourceExt: kube::CustomResourceExt {
    /// Generates the YAML schema of a `CustomResourceDefinition` and prints it to [stdout].
    ///
    /// [stdout]: std::io::stdout
    fn print_yaml_schema() -> Result<()> {
        Self::crd()
            .print_yaml_document(SerializeOptions::default())
            .context(WriteToStdoutSnafu)
    }
}

impl<T> CustomResourceExt for T where T: kube::CustomResourceExt {}
