//! DNS message encoding for presence queries.

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};

use mdnswatch_health::DiscoveryError;

/// Parse a host name into a fully-qualified DNS name.
pub fn parse_host(host: &str) -> Result<Name, DiscoveryError> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(DiscoveryError::InvalidName {
            host: host.to_string(),
            reason: "empty name".to_string(),
        });
    }

    let fqdn = if trimmed.ends_with('.') {
        trimmed.to_string()
    } else {
        format!("{trimmed}.")
    };

    Name::from_ascii(&fqdn).map_err(|e| DiscoveryError::InvalidName {
        host: host.to_string(),
        reason: e.to_string(),
    })
}

/// Encode a query asking for the A and AAAA records of `name`.
pub fn encode_query(name: &Name) -> Result<Vec<u8>, DiscoveryError> {
    let mut message = Message::new();
    message
        .set_id(0)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(false)
        .add_query(Query::query(name.clone(), RecordType::A))
        .add_query(Query::query(name.clone(), RecordType::AAAA));

    message
        .to_vec()
        .map_err(|e| DiscoveryError::Protocol(format!("encode query: {e}")))
}

/// Whether `packet` is a response carrying an address record for `name`.
///
/// Malformed packets and queries from other hosts on the link are not
/// answers.
pub fn answers(packet: &[u8], name: &Name) -> bool {
    let message = match Message::from_vec(packet) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed mdns packet");
            return false;
        }
    };

    if message.message_type() != MessageType::Response {
        return false;
    }

    message
        .answers()
        .iter()
        .chain(message.additionals())
        .any(|record| {
            matches!(record.record_type(), RecordType::A | RecordType::AAAA)
                && record.name() == name
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hickory_proto::rr::{RData, Record};
    use std::net::{Ipv4Addr, Ipv6Addr};

    /// Build a response packet with one address record per `(name, v6)`.
    pub(crate) fn response(records: &[(&str, bool)]) -> Vec<u8> {
        let mut message = Message::new();
        message
            .set_message_type(MessageType::Response)
            .set_authoritative(true);
        for (owner, v6) in records {
            let name = parse_host(owner).unwrap();
            let rdata = if *v6 {
                RData::AAAA(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1).into())
            } else {
                RData::A(Ipv4Addr::new(192, 168, 1, 10).into())
            };
            message.add_answer(Record::from_rdata(name, 120, rdata));
        }
        message.to_vec().unwrap()
    }

    #[test]
    fn parse_host_appends_root() {
        let name = parse_host("printer.local").unwrap();
        assert!(name.is_fqdn());
        assert_eq!(name.to_ascii(), "printer.local.");
    }

    #[test]
    fn parse_host_rejects_empty() {
        assert!(matches!(
            parse_host("  "),
            Err(DiscoveryError::InvalidName { .. })
        ));
    }

    #[test]
    fn query_asks_for_both_address_families() {
        let name = parse_host("printer.local").unwrap();
        let packet = encode_query(&name).unwrap();
        let decoded = Message::from_vec(&packet).unwrap();

        assert_eq!(decoded.message_type(), MessageType::Query);
        let types: Vec<RecordType> = decoded.queries().iter().map(|q| q.query_type()).collect();
        assert_eq!(types, vec![RecordType::A, RecordType::AAAA]);
        assert!(decoded.queries().iter().all(|q| q.name() == &name));
    }

    #[test]
    fn matching_answer_is_recognised() {
        let name = parse_host("printer.local").unwrap();
        assert!(answers(&response(&[("printer.local", false)]), &name));
        assert!(answers(&response(&[("printer.local", true)]), &name));
    }

    #[test]
    fn owner_name_match_is_case_insensitive() {
        let name = parse_host("Printer.Local").unwrap();
        assert!(answers(&response(&[("printer.local", false)]), &name));
    }

    #[test]
    fn other_hosts_are_not_answers() {
        let name = parse_host("printer.local").unwrap();
        assert!(!answers(&response(&[("scanner.local", false)]), &name));
    }

    #[test]
    fn queries_and_garbage_are_not_answers() {
        let name = parse_host("printer.local").unwrap();
        assert!(!answers(&encode_query(&name).unwrap(), &name));
        assert!(!answers(&[0xde, 0xad], &name));
    }
}
