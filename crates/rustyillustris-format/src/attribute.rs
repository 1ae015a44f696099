//! Attribute message parsing (message type 0x000C), versions 1 to 3.

use crate::bytes::{c_string, ensure_len, pad8, read_u16};
use crate::dataspace::Dataspace;
use crate::datatype::Datatype;
use crate::error::FormatError;
use crate::message_type::MessageType;
use crate::object_header::ObjectHeader;

/// A decoded attribute: name, type, extent and raw (file-order) bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMessage {
    pub name: String,
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    pub raw_data: Vec<u8>,
}

impl AttributeMessage {
    /// Parse an attribute message body.
    pub fn parse(data: &[u8], length_size: u8) -> Result<AttributeMessage, FormatError> {
        ensure_len(data, 0, 8)?;
        let version = data[0];
        let flags = data[1];
        let name_size = read_u16(data, 2)? as usize;
        let dt_size = read_u16(data, 4)? as usize;
        let ds_size = read_u16(data, 6)? as usize;
        if flags & 0x03 != 0 {
            return Err(FormatError::UnsupportedDatatype(String::from(
                "shared attribute datatype or dataspace",
            )));
        }
        let (mut pos, padded) = match version {
            1 => (8, true),
            2 => (8, false),
            3 => (9, false), // name character set encoding
            v => {
                return Err(FormatError::UnsupportedVersion {
                    structure: "attribute",
                    version: v,
                })
            }
        };
        let step = |n: usize| if padded { pad8(n) } else { n };

        ensure_len(data, pos, name_size)?;
        let name = c_string(&data[pos..pos + name_size]);
        pos += step(name_size);

        ensure_len(data, pos, dt_size)?;
        let datatype = Datatype::parse(&data[pos..pos + dt_size])?;
        pos += step(dt_size);

        ensure_len(data, pos, ds_size)?;
        let dataspace = Dataspace::parse(&data[pos..pos + ds_size], length_size)?;
        pos += step(ds_size);

        let nbytes = dataspace.num_elements() as usize * datatype.size() as usize;
        ensure_len(data, pos, nbytes)?;
        Ok(AttributeMessage {
            name,
            datatype,
            dataspace,
            raw_data: data[pos..pos + nbytes].to_vec(),
        })
    }

    /// Serialize as a version 3 attribute message.
    #[cfg(feature = "writer")]
    pub fn serialize(&self) -> Vec<u8> {
        let mut name = self.name.as_bytes().to_vec();
        name.push(0);
        let dt = self.datatype.serialize();
        let ds = self.dataspace.serialize();
        let mut buf = vec![3, 0];
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(dt.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(ds.len() as u16).to_le_bytes());
        buf.push(0); // ASCII
        buf.extend_from_slice(&name);
        buf.extend_from_slice(&dt);
        buf.extend_from_slice(&ds);
        buf.extend_from_slice(&self.raw_data);
        buf
    }
}

/// Every decodable compact attribute of an object.
///
/// Attributes that use shared or unknown encodings are skipped.
pub fn attributes(header: &ObjectHeader, length_size: u8) -> Vec<AttributeMessage> {
    header
        .find_all(MessageType::Attribute)
        .filter_map(|m| AttributeMessage::parse(&m.data, length_size).ok())
        .collect()
}
