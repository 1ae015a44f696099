//! HDF5 object header parsing (v1 and v2), following continuation blocks.

use std::collections::VecDeque;

use crate::bytes::{ensure_len, read_sized, read_u16, read_u32};
use crate::error::FormatError;
use crate::message_type::MessageType;

const OHDR_SIGNATURE: [u8; 4] = *b"OHDR";
const OCHK_SIGNATURE: [u8; 4] = *b"OCHK";

/// Message flag: the object cannot be opened when the message is unknown.
const FLAG_FAIL_IF_UNKNOWN: u8 = 0x80;

/// A single header message with its raw payload.
#[derive(Debug, Clone)]
pub struct HeaderMessage {
    /// The message type.
    pub msg_type: MessageType,
    /// Message flags byte.
    pub flags: u8,
    /// Raw message data bytes.
    pub data: Vec<u8>,
}

/// Parsed object header: every non-NIL message from all chunks.
#[derive(Debug, Clone)]
pub struct ObjectHeader {
    /// Header version (1 or 2).
    pub version: u8,
    /// Messages in file order, continuation chunks appended after.
    pub messages: Vec<HeaderMessage>,
}

/// Where a run of messages lives and how it is framed.
#[derive(Debug, Clone, Copy)]
struct MessageBlock {
    start: usize,
    end: usize,
}

impl ObjectHeader {
    /// Parse an object header at `offset`.
    ///
    /// `offset_size` and `length_size` come from the superblock.
    pub fn parse(
        data: &[u8],
        offset: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<ObjectHeader, FormatError> {
        ensure_len(data, offset, 4)?;
        if data[offset..offset + 4] == OHDR_SIGNATURE {
            Self::parse_v2(data, offset, offset_size, length_size)
        } else {
            Self::parse_v1(data, offset, offset_size, length_size)
        }
    }

    /// First message of the given type, if any.
    pub fn find(&self, msg_type: MessageType) -> Option<&HeaderMessage> {
        self.messages.iter().find(|m| m.msg_type == msg_type)
    }

    /// All messages of the given type.
    pub fn find_all(&self, msg_type: MessageType) -> impl Iterator<Item = &HeaderMessage> {
        self.messages.iter().filter(move |m| m.msg_type == msg_type)
    }

    /// True if the header describes a dataset.
    pub fn is_dataset(&self) -> bool {
        self.find(MessageType::DataLayout).is_some()
    }

    /// True if the header describes a group (old- or new-style).
    pub fn is_group(&self) -> bool {
        !self.is_dataset()
            && (self.find(MessageType::SymbolTable).is_some()
                || self.find(MessageType::Link).is_some()
                || self.find(MessageType::LinkInfo).is_some())
    }

    fn parse_v1(
        data: &[u8],
        offset: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<ObjectHeader, FormatError> {
        // version(1) reserved(1) num_messages(2) ref_count(4) header_size(4), padded to 16
        ensure_len(data, offset, 16)?;
        let version = data[offset];
        if version != 1 {
            return Err(FormatError::InvalidObjectHeaderVersion(version));
        }
        let header_size = read_u32(data, offset + 8)? as usize;
        let start = offset + 16;
        ensure_len(data, start, header_size)?;

        let mut messages = Vec::new();
        let mut blocks = VecDeque::from([MessageBlock {
            start,
            end: start + header_size,
        }]);
        while let Some(block) = blocks.pop_front() {
            let mut pos = block.start;
            while pos + 8 <= block.end {
                let raw_type = read_u16(data, pos)?;
                let size = read_u16(data, pos + 2)? as usize;
                let flags = data[pos + 4];
                pos += 8;
                if pos + size > block.end {
                    break;
                }
                Self::accept(
                    data,
                    raw_type,
                    flags,
                    &data[pos..pos + size],
                    offset_size,
                    length_size,
                    false,
                    &mut messages,
                    &mut blocks,
                )?;
                pos += size;
            }
        }

        Ok(ObjectHeader {
            version: 1,
            messages,
        })
    }

    fn parse_v2(
        data: &[u8],
        offset: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<ObjectHeader, FormatError> {
        ensure_len(data, offset, 6)?;
        let version = data[offset + 4];
        if version != 2 {
            return Err(FormatError::InvalidObjectHeaderVersion(version));
        }
        let flags = data[offset + 5];
        let mut pos = offset + 6;
        if flags & 0x20 != 0 {
            pos += 16; // access, modification, change, birth times
        }
        if flags & 0x10 != 0 {
            pos += 4; // attribute phase-change thresholds
        }
        let width = 1u8 << (flags & 0x03);
        let chunk0_size = read_sized(data, pos, width)? as usize;
        pos += width as usize;
        ensure_len(data, pos, chunk0_size + 4)?;
        let creation_order = flags & 0x04 != 0;

        let mut messages = Vec::new();
        let mut blocks = VecDeque::from([MessageBlock {
            start: pos,
            end: pos + chunk0_size,
        }]);
        let header_len = if creation_order { 6 } else { 4 };
        while let Some(block) = blocks.pop_front() {
            let mut pos = block.start;
            while pos + header_len <= block.end {
                let raw_type = data[pos] as u16;
                let size = read_u16(data, pos + 1)? as usize;
                let msg_flags = data[pos + 3];
                pos += header_len;
                if pos + size > block.end {
                    break;
                }
                Self::accept(
                    data,
                    raw_type,
                    msg_flags,
                    &data[pos..pos + size],
                    offset_size,
                    length_size,
                    true,
                    &mut messages,
                    &mut blocks,
                )?;
                pos += size;
            }
        }

        Ok(ObjectHeader {
            version: 2,
            messages,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn accept(
        data: &[u8],
        raw_type: u16,
        flags: u8,
        payload: &[u8],
        offset_size: u8,
        length_size: u8,
        chunked_v2: bool,
        messages: &mut Vec<HeaderMessage>,
        blocks: &mut VecDeque<MessageBlock>,
    ) -> Result<(), FormatError> {
        let msg_type = MessageType::from_u16(raw_type);
        match msg_type {
            MessageType::Nil => {}
            MessageType::ObjectHeaderContinuation => {
                let addr = read_sized(payload, 0, offset_size)? as usize;
                let len = read_sized(payload, offset_size as usize, length_size)? as usize;
                ensure_len(data, addr, len)?;
                if chunked_v2 {
                    if len < 8 || data[addr..addr + 4] != OCHK_SIGNATURE {
                        return Err(FormatError::InvalidSignature("OCHK"));
                    }
                    blocks.push_back(MessageBlock {
                        start: addr + 4,
                        end: addr + len - 4,
                    });
                } else {
                    blocks.push_back(MessageBlock {
                        start: addr,
                        end: addr + len,
                    });
                }
            }
            MessageType::Unknown(id) if flags & FLAG_FAIL_IF_UNKNOWN != 0 => {
                return Err(FormatError::UnsupportedMessage(id));
            }
            _ => messages.push(HeaderMessage {
                msg_type,
                flags,
                data: payload.to_vec(),
            }),
        }
        Ok(())
    }
}
