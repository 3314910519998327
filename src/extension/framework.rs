//! Producing and consuming extension blocks.

use nom::number::complete::be_u16;

use super::{descriptors_for, find, ExtensionType};
use crate::buffer::Buf;
use crate::codec::{put_u16, put_vec16, vec16};
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::HandshakeType;

/// Produce the extensions of `message`, without the outer length.
///
/// Descriptors run in declaration order. A hook returning `None` omits its
/// extension.
pub(crate) fn produce(
    ctx: &mut HandshakeContext,
    message: HandshakeType,
) -> Result<Buf, ProtocolFault> {
    ctx.extensions.clear_message(message);

    let mut out = Buf::new();
    for d in descriptors_for(message) {
        let Some(produce) = d.produce else {
            continue;
        };
        if !ctx.is_applicable(d, message) {
            continue;
        }
        let Some(data) = produce(ctx, message)? else {
            continue;
        };
        trace!("Produced {} in {} ({} bytes)", d.name, message, data.len());
        put_u16(&mut out, d.id.as_u16());
        put_vec16(&mut out, &data);
        ctx.extensions.insert(message, d.id, &data);
    }
    Ok(out)
}

/// Split an extension block (without the outer length) into entries.
pub(crate) fn parse_block(input: &[u8]) -> Result<Vec<(ExtensionType, &[u8])>, ProtocolFault> {
    let mut out: Vec<(ExtensionType, &[u8])> = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let (r, id) = be_u16(rest)?;
        let (r, data) = vec16(r)?;
        let id = ExtensionType::from_u16(id);
        if out.iter().any(|(i, _)| *i == id) {
            return Err(ProtocolFault::illegal_parameter(format!(
                "Duplicate extension {:?}",
                id
            )));
        }
        out.push((id, data));
        rest = r;
    }
    Ok(out)
}

fn is_request(message: HandshakeType) -> bool {
    matches!(
        message,
        HandshakeType::ClientHello | HandshakeType::CertificateRequest
    )
}

/// Load the extensions received in `message`.
///
/// Unknown extensions in requests are ignored. In responses, an extension
/// we did not ask for, or one that has no place in the message, is an
/// `unsupported_extension`. Load hooks run in declaration order, absent
/// hooks fire for descriptors without a matching entry.
pub(crate) fn consume_on_load(
    ctx: &mut HandshakeContext,
    message: HandshakeType,
    entries: &[(ExtensionType, &[u8])],
) -> Result<(), ProtocolFault> {
    if message == HandshakeType::ClientHello {
        if let Some(pos) = entries
            .iter()
            .position(|(id, _)| *id == ExtensionType::PreSharedKey)
        {
            if pos != entries.len() - 1 {
                return Err(ProtocolFault::illegal_parameter(
                    "pre_shared_key is not the last extension",
                ));
            }
        }
    }

    ctx.extensions.clear_message(message);

    for (id, data) in entries {
        let known = find(message, *id)
            .filter(|d| d.consume_on_load.is_some() && ctx.is_applicable(d, message));

        if known.is_none() {
            if is_request(message) {
                if super::is_consumable(*id) {
                    trace!("Skipping {:?} in {} for {}", id, message, ctx.version);
                } else {
                    warn!("Ignoring unknown extension {:?} in {}", id, message);
                }
                continue;
            }
            return Err(ProtocolFault::unsupported_extension(format!(
                "{:?} in {}",
                id, message
            )));
        }

        let solicited = is_request(message)
            || ctx.extensions.contains(HandshakeType::ClientHello, *id)
            || (message == HandshakeType::HelloRetryRequest && *id == ExtensionType::Cookie);
        if !solicited {
            return Err(ProtocolFault::unsupported_extension(format!(
                "Unsolicited {:?} in {}",
                id, message
            )));
        }

        ctx.extensions.insert(message, *id, data);
    }

    for d in descriptors_for(message) {
        if !ctx.is_applicable(d, message) {
            continue;
        }
        let data = ctx.extensions.get(message, d.id).map(Buf::from_slice);
        match (data, d.consume_on_load, d.absent_on_load) {
            (Some(data), Some(load), _) => {
                trace!("Loading {} in {}", d.name, message);
                load(ctx, message, &data)?;
            }
            (None, _, Some(absent)) => absent(ctx, message)?,
            _ => {}
        }
    }
    Ok(())
}

/// Act on the loaded extensions of `message`.
pub(crate) fn consume_on_trade(
    ctx: &mut HandshakeContext,
    message: HandshakeType,
) -> Result<(), ProtocolFault> {
    for d in descriptors_for(message) {
        if !ctx.is_applicable(d, message) {
            continue;
        }
        let hook = if ctx.extensions.contains(message, d.id) {
            d.consume_on_trade
        } else {
            d.absent_on_trade
        };
        if let Some(hook) = hook {
            hook(ctx, message)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Alert;

    const BLOCK: &[u8] = &[
        0x00, 0x17, // extended_master_secret
        0x00, 0x00, // empty
        0x00, 0x0B, // ec_point_formats
        0x00, 0x02, // length
        0x01, 0x00, // uncompressed
    ];

    #[test]
    fn parse_entries_in_order() {
        let entries = parse_block(BLOCK).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, ExtensionType::ExtendedMasterSecret);
        assert!(entries[0].1.is_empty());
        assert_eq!(entries[1].0, ExtensionType::EcPointFormats);
        assert_eq!(entries[1].1, &[0x01, 0x00]);
    }

    #[test]
    fn duplicate_is_illegal_parameter() {
        let mut block = BLOCK.to_vec();
        block.extend_from_slice(&[0x00, 0x17, 0x00, 0x00]);
        let err = parse_block(&block).unwrap_err();
        assert_eq!(err.alert, Alert::IllegalParameter);
    }

    #[test]
    fn truncated_is_decode_error() {
        let err = parse_block(&BLOCK[..BLOCK.len() - 1]).unwrap_err();
        assert_eq!(err.alert, Alert::DecodeError);
        let err = parse_block(&[0x00]).unwrap_err();
        assert_eq!(err.alert, Alert::DecodeError);
    }
}
