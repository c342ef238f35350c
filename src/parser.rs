//! PDF object parser.
//!
//! Combines lexer tokens into complete objects: primitives, arrays,
//! dictionaries, streams, and indirect references. Parsing is lenient
//! where real-world files commonly deviate (unclosed structures at EOF,
//! missing /Length).

use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Object, ObjectRef};
use nom::IResult;
use std::collections::HashMap;

/// Decode escape sequences in PDF literal strings (7.3.4.2).
///
/// Handles the single-character escapes (\n, \r, \t, \b, \f, \(, \), \\),
/// octal escapes (\ddd, 1-3 digits), and line continuations
/// (backslash-newline, which is dropped). Unknown escapes keep the
/// backslash literal, as the PDF spec allows.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            match raw[i + 1] {
                b'n' => {
                    result.push(b'\n');
                    i += 2;
                },
                b'r' => {
                    result.push(b'\r');
                    i += 2;
                },
                b't' => {
                    result.push(b'\t');
                    i += 2;
                },
                b'b' => {
                    result.push(8);
                    i += 2;
                },
                b'f' => {
                    result.push(12);
                    i += 2;
                },
                b'(' => {
                    result.push(b'(');
                    i += 2;
                },
                b')' => {
                    result.push(b')');
                    i += 2;
                },
                b'\\' => {
                    result.push(b'\\');
                    i += 2;
                },
                b'\n' => {
                    i += 2;
                },
                b'\r' => {
                    // \r or \r\n continuation
                    i += 2;
                    if i < raw.len() && raw[i] == b'\n' {
                        i += 1;
                    }
                },
                c if c.is_ascii_digit() && c < b'8' => {
                    let start = i + 1;
                    let mut octal_value = 0u32;
                    let mut octal_len = 0;

                    for j in 0..3 {
                        if start + j < raw.len() {
                            let digit = raw[start + j];
                            if (b'0'..b'8').contains(&digit) {
                                octal_value = octal_value * 8 + (digit - b'0') as u32;
                                octal_len += 1;
                            } else {
                                break;
                            }
                        } else {
                            break;
                        }
                    }

                    if octal_len > 0 {
                        result.push((octal_value & 0xFF) as u8);
                        i += 1 + octal_len;
                    } else {
                        result.push(b'\\');
                        i += 1;
                    }
                },
                _ => {
                    result.push(b'\\');
                    i += 1;
                },
            }
        } else {
            result.push(raw[i]);
            i += 1;
        }
    }

    result
}

/// Parse a PDF object from input bytes.
///
/// Handles all object types including indirect references ("10 0 R" is
/// disambiguated from a plain integer by lookahead) and streams (a
/// dictionary followed by the `stream` keyword).
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),

        Token::Integer(i) => {
            // Could be a plain integer OR the start of "obj_num gen R"
            if let Ok((input2, Token::Integer(gen))) = token(input) {
                if let Ok((input3, Token::R)) = token(input2) {
                    return Ok((input3, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                }
            }

            Ok((input, Object::Integer(i)))
        },

        Token::Real(r) => Ok((input, Object::Real(r))),

        Token::LiteralString(bytes) => {
            let decoded = decode_literal_string_escapes(bytes);
            Ok((input, Object::String(decoded)))
        },

        Token::HexString(hex_bytes) => match decode_hex(hex_bytes) {
            Ok(decoded) => Ok((input, Object::String(decoded))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Fail,
            ))),
        },

        Token::Name(name) => Ok((input, Object::Name(name))),

        Token::ArrayStart => parse_array(input),

        Token::DictStart => {
            let (remaining, dict_obj) = parse_dictionary(input)?;

            // A dictionary followed by `stream` is a stream object
            if let Ok((stream_input, Token::StreamStart)) = token(remaining) {
                let dict = match dict_obj {
                    Object::Dictionary(d) => d,
                    _ => {
                        return Err(nom::Err::Error(nom::error::Error::new(
                            input,
                            nom::error::ErrorKind::Tag,
                        )));
                    },
                };

                let (final_input, stream_data) = parse_stream_data(stream_input, &dict)?;

                return Ok((
                    final_input,
                    Object::Stream {
                        dict,
                        data: bytes::Bytes::from(stream_data),
                    },
                ));
            }

            Ok((remaining, dict_obj))
        },

        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

/// Parse stream data after the `stream` keyword.
///
/// The keyword must be followed by CRLF or LF (7.3.8.1); CR alone or no
/// newline is tolerated with a warning. /Length drives the read; when it
/// is missing or indirect, the data is delimited by scanning for
/// `endstream`.
fn parse_stream_data<'a>(
    input: &'a [u8],
    dict: &HashMap<String, Object>,
) -> IResult<&'a [u8], Vec<u8>> {
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") {
        &input[1..]
    } else if input.starts_with(b"\r") {
        log::warn!("stream keyword followed by CR alone; accepting in lenient mode");
        &input[1..]
    } else {
        log::warn!("no newline after stream keyword; accepting in lenient mode");
        input
    };

    if let Some(length_obj) = dict.get("Length") {
        if let Some(length) = length_obj.as_integer() {
            let length = length as usize;
            if input.len() < length {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Eof,
                )));
            }

            let stream_data = input[..length].to_vec();
            let remaining = &input[length..];

            let (remaining, _) =
                nom::bytes::complete::take_while(|c: u8| c.is_ascii_whitespace())(remaining)?;
            let (remaining, _) = token(remaining)?; // endstream

            return Ok((remaining, stream_data));
        }
    }

    // No usable /Length: fall back to scanning for the endstream keyword
    if let Some(pos) = find_endstream(input) {
        let stream_data = input[..pos].to_vec();
        let remaining = &input[pos..];

        let (remaining, _) = token(remaining)?;

        return Ok((remaining, stream_data));
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof)))
}

/// Find the position of 'endstream' keyword in input.
fn find_endstream(input: &[u8]) -> Option<usize> {
    let keyword = b"endstream";
    input
        .windows(keyword.len())
        .position(|window| window == keyword)
}

/// Parse a PDF array: `[ obj1 obj2 ... objN ]`
///
/// Unclosed arrays at EOF return what was collected.
fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        let token_result = token(remaining);

        match token_result {
            Ok((inp, tok)) => {
                if tok == Token::ArrayEnd {
                    return Ok((inp, Object::Array(objects)));
                }

                match parse_object(remaining) {
                    Ok((inp, obj)) => {
                        objects.push(obj);
                        remaining = inp;
                    },
                    Err(e) => {
                        if remaining.is_empty() {
                            return Ok((remaining, Object::Array(objects)));
                        }
                        return Err(e);
                    },
                }
            },
            Err(nom::Err::Incomplete(_)) | Err(nom::Err::Error(_)) if remaining.is_empty() => {
                return Ok((remaining, Object::Array(objects)));
            },
            Err(e) => return Err(e),
        }
    }
}

/// Parse a PDF dictionary: `<< /Key1 value1 /Key2 value2 ... >>`
///
/// Keys must be names; unclosed dictionaries at EOF return what was
/// collected.
fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Object> {
    let mut dict = HashMap::new();
    let mut remaining = input;

    loop {
        let token_result = token(remaining);

        match token_result {
            Ok((inp, tok)) => {
                if tok == Token::DictEnd {
                    return Ok((inp, Object::Dictionary(dict)));
                }

                match tok {
                    Token::Name(key) => match parse_object(inp) {
                        Ok((inp, value)) => {
                            dict.insert(key, value);
                            remaining = inp;
                        },
                        Err(e) => {
                            if inp.is_empty() {
                                return Ok((inp, Object::Dictionary(dict)));
                            }
                            return Err(e);
                        },
                    },
                    _ => {
                        if remaining.is_empty() {
                            return Ok((remaining, Object::Dictionary(dict)));
                        }
                        return Err(nom::Err::Error(nom::error::Error::new(
                            remaining,
                            nom::error::ErrorKind::Tag,
                        )));
                    },
                }
            },
            Err(nom::Err::Incomplete(_)) | Err(nom::Err::Error(_)) if remaining.is_empty() => {
                return Ok((remaining, Object::Dictionary(dict)));
            },
            Err(e) => return Err(e),
        }
    }
}

/// Decode a hex string to bytes.
///
/// Whitespace is ignored; an odd trailing digit is padded with 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let hex_str: Vec<u8> = hex_bytes
        .iter()
        .filter(|&&c| !c.is_ascii_whitespace())
        .copied()
        .collect();

    if hex_str.is_empty() {
        return Ok(Vec::new());
    }

    let mut result = Vec::with_capacity(hex_str.len() / 2 + 1);

    for chunk in hex_str.chunks(2) {
        let hex = std::str::from_utf8(chunk).map_err(|e| Error::ParseError {
            offset: 0,
            reason: format!("Invalid UTF-8 in hex string: {}", e),
        })?;
        let byte = if chunk.len() == 2 {
            u8::from_str_radix(hex, 16)
        } else {
            u8::from_str_radix(&format!("{}0", hex), 16)
        }
        .map_err(|e| Error::ParseError {
            offset: 0,
            reason: format!("Invalid hex digit: {}", e),
        })?;
        result.push(byte);
    }

    Ok(result)
}
