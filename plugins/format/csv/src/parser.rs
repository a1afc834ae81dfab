// ═══════════════════════════════════════════════════════════════
//  RFC 4180 field parser
// ═══════════════════════════════════════════════════════════════

/// Split one log line into values, honouring double quotes when `quoting`
/// is on. The line must already have its terminator stripped.
pub(crate) fn parse_fields(line: &str, delimiter: char, quoting: bool) -> Vec<String> {
    if !quoting {
        return line.split(delimiter).map(|s| s.to_string()).collect();
    }

    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    let mut field = String::new();

    loop {
        let mut at_delimiter = false;
        if chars.peek() == Some(&'"') {
            // Quoted field (RFC 4180 rule 5-7)
            chars.next();
            while let Some(c) = chars.next() {
                if c != '"' {
                    field.push(c);
                } else if chars.peek() == Some(&'"') {
                    // "" → "
                    chars.next();
                    field.push('"');
                } else {
                    break;
                }
            }
            // Anything between the closing quote and the delimiter is dropped.
            for c in chars.by_ref() {
                if c == delimiter {
                    at_delimiter = true;
                    break;
                }
            }
        } else {
            for c in chars.by_ref() {
                if c == delimiter {
                    at_delimiter = true;
                    break;
                }
                field.push(c);
            }
        }

        fields.push(std::mem::take(&mut field));

        if chars.peek().is_none() {
            // Trailing delimiter → one more empty field
            if at_delimiter {
                fields.push(String::new());
            }
            break;
        }
    }

    fields
}
