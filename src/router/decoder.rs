// Route decoder module
// This file implements the cursor that walks a binary route one step at a time.
// Decoding is strict: a route either decodes to exactly its end or fails
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Address, U256};
use thiserror::Error;
use tracing::debug;

use crate::quant::FULL_SCALE;
use crate::router::routes::{CommandCode, PermitPayload, Split, Step, PERMIT_LEN, SELECTOR_LEN};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("route truncated at offset {offset}: need {needed} bytes, {remaining} remain")]
    UnexpectedEnd {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("unknown command code {code} at offset {offset}")]
    UnknownCommandCode { code: u8, offset: usize },

    #[error("split payload at offset {offset} is {len} bytes, shorter than a selector")]
    MissingSelector { offset: usize, len: usize },
}

/// Forward-only reader over a route buffer.
#[derive(Debug, Clone)]
pub struct RouteStream<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RouteStream<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn has_more(&self) -> bool {
        self.pos < self.buf.len()
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEnd {
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&mut self) -> Result<u32, DecodeError> {
        let b = self.read_bytes(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_address(&mut self) -> Result<Address, DecodeError> {
        Ok(Address::from_slice(self.read_bytes(20)?))
    }

    pub fn read_u256(&mut self) -> Result<U256, DecodeError> {
        Ok(U256::from_be_slice(self.read_bytes(32)?))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Two-byte big-endian length followed by that many bytes.
    pub fn read_prefixed(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len)
    }
}

/// Decodes route steps lazily from a [`RouteStream`].
#[derive(Debug, Clone)]
pub struct RouteDecoder<'a> {
    stream: RouteStream<'a>,
}

impl<'a> RouteDecoder<'a> {
    pub fn new(route: &'a [u8]) -> Self {
        Self {
            stream: RouteStream::new(route),
        }
    }

    pub fn has_more(&self) -> bool {
        self.stream.has_more()
    }

    pub fn position(&self) -> usize {
        self.stream.position()
    }

    pub fn next_step(&mut self) -> Result<Step<'a>, DecodeError> {
        let offset = self.stream.position();
        let code = self.stream.read_u8()?;
        let command =
            CommandCode::from_byte(code).ok_or(DecodeError::UnknownCommandCode { code, offset })?;

        if command == CommandCode::Permit {
            let mut body = RouteStream::new(self.stream.read_bytes(PERMIT_LEN)?);
            let permit = PermitPayload {
                value: body.read_u256()?,
                deadline: body.read_u256()?,
                v: body.read_u8()?,
                r: body.read_array::<32>()?,
                s: body.read_array::<32>()?,
            };
            debug!(offset, "decoded permit step");
            return Ok(Step::Permit(permit));
        }

        let asset = if command.carries_asset() {
            self.stream.read_address()?
        } else {
            crate::ledger::NATIVE
        };

        let splits = if command.carries_split_list() {
            let count = self.stream.read_u8()?;
            let mut splits = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let weight = self.stream.read_u16()?;
                splits.push(self.read_split(weight)?);
            }
            splits
        } else {
            vec![self.read_split(FULL_SCALE)?]
        };

        debug!(
            offset,
            command = command.as_str(),
            asset = %asset,
            splits = splits.len(),
            "decoded route step"
        );
        Ok(Step::Swap {
            command,
            asset,
            splits,
        })
    }

    /// Decode every remaining step. Fails on the first malformed byte.
    pub fn decode_all(mut self) -> Result<Vec<Step<'a>>, DecodeError> {
        let mut steps = Vec::new();
        while self.has_more() {
            steps.push(self.next_step()?);
        }
        Ok(steps)
    }

    fn read_split(&mut self, weight: u16) -> Result<Split<'a>, DecodeError> {
        let offset = self.stream.position();
        let payload = self.stream.read_prefixed()?;
        if payload.len() < SELECTOR_LEN {
            return Err(DecodeError::MissingSelector {
                offset,
                len: payload.len(),
            });
        }
        let mut selector = [0u8; SELECTOR_LEN];
        selector.copy_from_slice(&payload[..SELECTOR_LEN]);
        Ok(Split {
            weight,
            selector,
            data: &payload[SELECTOR_LEN..],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::routes::RouteBuilder;

    const SEL: [u8; 4] = [0xaa, 0xbb, 0xcc, 0xdd];

    fn payload(extra: &[u8]) -> Vec<u8> {
        let mut p = SEL.to_vec();
        p.extend_from_slice(extra);
        p
    }

    #[test]
    fn decodes_every_command_to_the_exact_end() {
        let asset = Address::repeat_byte(0x42);
        let permit = PermitPayload {
            value: U256::from(7u64),
            deadline: U256::from(99u64),
            v: 0,
            r: [1u8; 32],
            s: [2u8; 32],
        };
        let route = RouteBuilder::new()
            .permit(&permit)
            .pull(asset, &[(30_000, payload(&[1])), (35_535, payload(&[2, 3]))])
            .own_balance(asset, &[(FULL_SCALE, payload(&[]))])
            .native(&payload(&[4]))
            .continuation(asset, &payload(&[5, 6, 7]))
            .build()
            .unwrap();

        let mut decoder = RouteDecoder::new(&route);
        assert_eq!(decoder.next_step().unwrap(), Step::Permit(permit));

        match decoder.next_step().unwrap() {
            Step::Swap { command, asset: a, splits } => {
                assert_eq!(command, CommandCode::PullFromCaller);
                assert_eq!(a, asset);
                assert_eq!(splits.len(), 2);
                assert_eq!(splits[0].weight, 30_000);
                assert_eq!(splits[0].selector, SEL);
                assert_eq!(splits[1].data, &[2, 3]);
            }
            other => panic!("unexpected step {other:?}"),
        }
        assert_eq!(decoder.next_step().unwrap().command(), CommandCode::OwnBalance);

        match decoder.next_step().unwrap() {
            Step::Swap { command, asset: a, splits } => {
                assert_eq!(command, CommandCode::Native);
                assert_eq!(a, crate::ledger::NATIVE);
                assert_eq!(splits[0].weight, FULL_SCALE);
                assert_eq!(splits[0].data, &[4]);
            }
            other => panic!("unexpected step {other:?}"),
        }
        match decoder.next_step().unwrap() {
            Step::Swap { command, splits, .. } => {
                assert_eq!(command, CommandCode::Continuation);
                assert_eq!(splits[0].data, &[5, 6, 7]);
            }
            other => panic!("unexpected step {other:?}"),
        }
        assert!(!decoder.has_more());
        assert_eq!(decoder.position(), route.len());
    }

    #[test]
    fn truncated_payload_is_fatal() {
        let route = RouteBuilder::new()
            .pull_one(Address::repeat_byte(1), payload(&[9, 9, 9]))
            .build()
            .unwrap();
        let cut = &route[..route.len() - 1];
        let err = RouteDecoder::new(cut).decode_all().unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEnd { needed: 7, remaining: 6, .. }));
    }

    #[test]
    fn unknown_command_code_reports_offset() {
        let route = RouteBuilder::new()
            .native(&payload(&[]))
            .raw(&[0x09])
            .build()
            .unwrap();
        let err = RouteDecoder::new(&route).decode_all().unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownCommandCode {
                code: 9,
                offset: route.len() - 1
            }
        );
        let err = RouteDecoder::new(&[0u8]).decode_all().unwrap_err();
        assert_eq!(err, DecodeError::UnknownCommandCode { code: 0, offset: 0 });
    }

    #[test]
    fn payload_without_selector_is_rejected() {
        let route = RouteBuilder::new().native(&[1, 2]).build().unwrap();
        let err = RouteDecoder::new(&route).decode_all().unwrap_err();
        assert_eq!(err, DecodeError::MissingSelector { offset: 1, len: 2 });
    }

    #[test]
    fn stream_reads_big_endian_fields() {
        let bytes = [0x01, 0x02, 0x0a, 0x0b, 0x0c];
        let mut s = RouteStream::new(&bytes);
        assert_eq!(s.read_u16().unwrap(), 0x0102);
        assert_eq!(s.read_u24().unwrap(), 0x0a0b0c);
        assert!(!s.has_more());
        assert!(s.read_u8().is_err());
    }
}
