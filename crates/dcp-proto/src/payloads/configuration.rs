//! Configuration carried by `STC_configure`.

use bytes::BytesMut;

use crate::{
    DecodeError, EncodeError, NamedValue,
    codec::{PayloadReader, Wire, put_list, put_string},
};

/// Slave configuration pushed by the master before initialization.
///
/// `inputs` and `outputs` name the variables exchanged through
/// `DAT_input_output`. An empty list means "no filtering".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    /// Initial parameter values.
    pub parameters: Vec<NamedValue>,
    /// Input variables the slave should store.
    pub inputs: Vec<String>,
    /// Output variables the slave should publish.
    pub outputs: Vec<String>,
}

impl Configuration {
    /// Look up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&NamedValue> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

impl Wire for Configuration {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        put_list(buf, "parameters", &self.parameters, |buf, p| p.write(buf))?;
        put_list(buf, "inputs", &self.inputs, |buf, name| put_string(buf, "input name", name))?;
        put_list(buf, "outputs", &self.outputs, |buf, name| put_string(buf, "output name", name))
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        let parameters = reader.list(NamedValue::read)?;
        let inputs = reader.list(PayloadReader::string)?;
        let outputs = reader.list(PayloadReader::string)?;
        Ok(Self { parameters, inputs, outputs })
    }
}
