//! Link message parsing (message type 0x0006), the member list of
//! new-style compact groups.

use crate::bytes::{ensure_len, read_sized, read_u16};
use crate::error::FormatError;

/// What a link points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Hard link to an object header.
    Hard { object_header_address: u64 },
    /// Soft link holding a path in the same file.
    Soft { target_path: String },
    /// External link (file name and object path, NUL separated).
    External,
}

/// A parsed link message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
    pub name: String,
    pub target: LinkTarget,
}

impl LinkMessage {
    /// Parse a link message body.
    pub fn parse(data: &[u8], offset_size: u8) -> Result<LinkMessage, FormatError> {
        ensure_len(data, 0, 2)?;
        if data[0] != 1 {
            return Err(FormatError::UnsupportedVersion {
                structure: "link message",
                version: data[0],
            });
        }
        let flags = data[1];
        let mut pos = 2;
        let link_type = if flags & 0x08 != 0 {
            pos += 1;
            data.get(pos - 1).copied().unwrap_or(0)
        } else {
            0
        };
        if flags & 0x04 != 0 {
            pos += 8; // creation order
        }
        if flags & 0x10 != 0 {
            pos += 1; // name character set
        }
        let width = 1u8 << (flags & 0x03);
        let name_len = read_sized(data, pos, width)? as usize;
        pos += width as usize;
        ensure_len(data, pos, name_len)?;
        let name = String::from_utf8_lossy(&data[pos..pos + name_len]).into_owned();
        pos += name_len;

        let target = match link_type {
            0 => LinkTarget::Hard {
                object_header_address: read_sized(data, pos, offset_size)?,
            },
            1 => {
                let len = read_u16(data, pos)? as usize;
                ensure_len(data, pos + 2, len)?;
                LinkTarget::Soft {
                    target_path: String::from_utf8_lossy(&data[pos + 2..pos + 2 + len])
                        .into_owned(),
                }
            }
            _ => LinkTarget::External,
        };
        Ok(LinkMessage { name, target })
    }

    /// Serialize a hard link with 8-byte addresses.
    #[cfg(feature = "writer")]
    pub fn serialize_hard(name: &str, address: u64) -> Vec<u8> {
        let mut buf = vec![1, 0];
        buf.push(name.len() as u8);
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&address.to_le_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_link() {
        let mut d = vec![1, 0, 6];
        d.extend_from_slice(b"Header");
        d.extend_from_slice(&4242u64.to_le_bytes());
        let link = LinkMessage::parse(&d, 8).unwrap();
        assert_eq!(link.name, "Header");
        assert_eq!(
            link.target,
            LinkTarget::Hard {
                object_header_address: 4242
            }
        );
    }

    #[test]
    fn soft_link_with_creation_order() {
        let mut d = vec![1, 0x08 | 0x04, 1];
        d.extend_from_slice(&3u64.to_le_bytes());
        d.push(4);
        d.extend_from_slice(b"fast");
        d.extend_from_slice(&5u16.to_le_bytes());
        d.extend_from_slice(b"/slow");
        let link = LinkMessage::parse(&d, 8).unwrap();
        assert_eq!(link.name, "fast");
        assert_eq!(
            link.target,
            LinkTarget::Soft {
                target_path: String::from("/slow")
            }
        );
    }

    #[cfg(feature = "writer")]
    #[test]
    fn serialized_hard_link_parses() {
        let link = LinkMessage::parse(&LinkMessage::serialize_hard("PartType1", 96), 8).unwrap();
        assert_eq!(link.name, "PartType1");
        assert_eq!(
            link.target,
            LinkTarget::Hard {
                object_header_address: 96
            }
        );
    }
}
