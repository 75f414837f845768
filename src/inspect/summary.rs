//! Best-effort DNS message decoding for log output.
//!
//! Only the header, the question section and the answer section are
//! looked at. Anything malformed yields `None`; the relay forwards the
//! bytes regardless.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Length of the fixed DNS header.
const HEADER_LEN: usize = 12;

/// Compression pointers followed before a name is treated as malformed.
const MAX_POINTER_JUMPS: usize = 16;

/// Decoded DNS header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSummary {
    pub id: u16,
    pub response: bool,
    pub opcode: u8,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl HeaderSummary {
    /// Decode the header of an unframed message, if long enough.
    pub fn peek(message: &[u8]) -> Option<Self> {
        let h = message.get(..HEADER_LEN)?;
        let be = |i: usize| u16::from_be_bytes([h[i], h[i + 1]]);

        Some(Self {
            id: be(0),
            response: h[2] & 0x80 != 0,
            opcode: (h[2] >> 3) & 0x0f,
            rcode: h[3] & 0x0f,
            qdcount: be(4),
            ancount: be(6),
            nscount: be(8),
            arcount: be(10),
        })
    }

    fn opcode_str(&self) -> &'static str {
        match self.opcode {
            0 => "QUERY",
            1 => "IQUERY",
            2 => "STATUS",
            4 => "NOTIFY",
            5 => "UPDATE",
            _ => "RESERVED",
        }
    }

    fn rcode_str(&self) -> &'static str {
        match self.rcode {
            0 => "NOERROR",
            1 => "FORMERR",
            2 => "SERVFAIL",
            3 => "NXDOMAIN",
            4 => "NOTIMP",
            5 => "REFUSED",
            _ => "RESERVED",
        }
    }
}

impl fmt::Display for HeaderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={:#06x} {} {}",
            self.id,
            if self.response { "response" } else { "query" },
            self.opcode_str()
        )?;
        if self.response {
            write!(f, " {}", self.rcode_str())?;
        }
        write!(
            f,
            " qd={} an={} ns={} ar={}",
            self.qdcount, self.ancount, self.nscount, self.arcount
        )
    }
}

/// Mnemonic for a record type.
pub fn record_type_name(rtype: u16) -> Option<&'static str> {
    Some(match rtype {
        1 => "A",
        2 => "NS",
        5 => "CNAME",
        6 => "SOA",
        12 => "PTR",
        15 => "MX",
        16 => "TXT",
        28 => "AAAA",
        33 => "SRV",
        41 => "OPT",
        65 => "HTTPS",
        255 => "ANY",
        _ => return None,
    })
}

struct RecordType(u16);

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match record_type_name(self.0) {
            Some(name) => f.write_str(name),
            None => write!(f, "TYPE{}", self.0),
        }
    }
}

/// One entry of the question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, RecordType(self.qtype))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerData {
    /// A or AAAA record
    Addr(IpAddr),
    /// Anything else, by RDATA length
    Other { len: usize },
}

/// One entry of the answer section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub name: String,
    pub rtype: u16,
    pub ttl: u32,
    pub data: AnswerData,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ttl={}", self.name, RecordType(self.rtype), self.ttl)?;
        match &self.data {
            AnswerData::Addr(addr) => write!(f, " {addr}"),
            AnswerData::Other { len } => write!(f, " ({len} bytes)"),
        }
    }
}

/// Question section of an unframed message.
pub fn questions(message: &[u8]) -> Option<Vec<Question>> {
    let header = HeaderSummary::peek(message)?;
    read_questions(message, header.qdcount).map(|(questions, _)| questions)
}

/// Answer section of an unframed message.
pub fn answers(message: &[u8]) -> Option<Vec<Answer>> {
    let header = HeaderSummary::peek(message)?;
    let (_, mut pos) = read_questions(message, header.qdcount)?;

    let mut answers = Vec::new();
    for _ in 0..header.ancount {
        let (name, next) = read_name(message, pos)?;
        let fixed = message.get(next..next + 10)?;
        let rtype = u16::from_be_bytes([fixed[0], fixed[1]]);
        let ttl = u32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let rdlength = u16::from_be_bytes([fixed[8], fixed[9]]) as usize;

        let rdata_start = next + 10;
        let rdata = message.get(rdata_start..rdata_start + rdlength)?;
        let data = match (rtype, rdata.len()) {
            (1, 4) => AnswerData::Addr(IpAddr::V4(Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]))),
            (28, 16) => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(rdata);
                AnswerData::Addr(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            _ => AnswerData::Other { len: rdlength },
        };

        answers.push(Answer {
            name,
            rtype,
            ttl,
            data,
        });
        pos = rdata_start + rdlength;
    }

    Some(answers)
}

/// Read `count` questions starting after the header; returns the offset
/// just past the question section.
fn read_questions(message: &[u8], count: u16) -> Option<(Vec<Question>, usize)> {
    let mut pos = HEADER_LEN;
    let mut questions = Vec::new();

    for _ in 0..count {
        let (name, next) = read_name(message, pos)?;
        let qtype = message.get(next..next + 2)?;
        // QCLASS must be present too.
        message.get(next + 2..next + 4)?;

        questions.push(Question {
            name,
            qtype: u16::from_be_bytes([qtype[0], qtype[1]]),
        });
        pos = next + 4;
    }

    Some((questions, pos))
}

/// Read a possibly compressed name at `pos`; returns the name and the
/// offset just past it in the original position.
fn read_name(message: &[u8], mut pos: usize) -> Option<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut end = None;
    let mut jumps = 0;

    loop {
        let len = *message.get(pos)? as usize;
        match len & 0xc0 {
            0x00 if len == 0 => {
                let name = if labels.is_empty() {
                    ".".to_string()
                } else {
                    labels.join(".")
                };
                return Some((name, end.unwrap_or(pos + 1)));
            }
            0x00 => {
                let label = message.get(pos + 1..pos + 1 + len)?;
                labels.push(String::from_utf8_lossy(label).into_owned());
                pos += 1 + len;
            }
            0xc0 => {
                let low = *message.get(pos + 1)? as usize;
                end.get_or_insert(pos + 2);
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return None;
                }
                pos = ((len & 0x3f) << 8) | low;
            }
            _ => return None,
        }
    }
}

/// Header plus whatever of the question and answer sections decodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub header: HeaderSummary,
    pub questions: Option<Vec<Question>>,
    pub answers: Option<Vec<Answer>>,
}

impl MessageSummary {
    pub fn decode(message: &[u8]) -> Option<Self> {
        Some(Self {
            header: HeaderSummary::peek(message)?,
            questions: questions(message),
            answers: answers(message),
        })
    }
}

impl fmt::Display for MessageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)?;
        write_section(f, "questions", self.questions.as_deref())?;
        if self.header.response {
            write_section(f, "answers", self.answers.as_deref())?;
        }
        Ok(())
    }
}

fn write_section<T: fmt::Display>(f: &mut fmt::Formatter<'_>, label: &str, items: Option<&[T]>) -> fmt::Result {
    let Some(items) = items else {
        return write!(f, " {label}=<malformed>");
    };
    write!(f, " {label}={{")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, " {item}")?;
    }
    f.write_str(" }")
}
