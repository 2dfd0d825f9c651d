//! HTML tokenizer for Sinopia templates.
//!
//! A byte-level state machine in the style of htmlparser2. Script fragments
//! (`[[ … ]]` by default) are skipped as opaque runs inside text and attribute
//! values, so a `<`, `>` or quote inside a fragment never ends the surrounding
//! token.

use sinopia_carton::{find_marker_close, is_raw_text_tag};

use crate::errors::ErrorCode;

/// Character codes for fast comparison
pub mod char_codes {
    pub const TAB: u8 = 0x09;
    pub const NEWLINE: u8 = 0x0A;
    pub const FORM_FEED: u8 = 0x0C;
    pub const CARRIAGE_RETURN: u8 = 0x0D;
    pub const SPACE: u8 = 0x20;
    pub const EXCLAMATION_MARK: u8 = 0x21;
    pub const DOUBLE_QUOTE: u8 = 0x22;
    pub const SINGLE_QUOTE: u8 = 0x27;
    pub const DASH: u8 = 0x2D;
    pub const SLASH: u8 = 0x2F;
    pub const LT: u8 = 0x3C;
    pub const EQ: u8 = 0x3D;
    pub const GT: u8 = 0x3E;
    pub const QUESTION_MARK: u8 = 0x3F;
    pub const UPPER_A: u8 = 0x41;
    pub const UPPER_Z: u8 = 0x5A;
    pub const LOWER_A: u8 = 0x61;
    pub const LOWER_Z: u8 = 0x7A;
}

use char_codes::*;

/// All the states the tokenizer can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Text = 1,

    // Tags
    BeforeTagName,
    InTagName,
    InSelfClosingTag,
    BeforeClosingTagName,
    InClosingTagName,
    AfterClosingTagName,

    // Attributes
    BeforeAttrName,
    InAttrName,
    AfterAttrName,
    BeforeAttrValue,
    InAttrValueDq,
    InAttrValueSq,
    InAttrValueNq,

    // Declarations
    BeforeDeclaration,
    InDeclaration,

    // Processing instructions
    InProcessingInstruction,

    // Comments
    BeforeComment,
    InCommentLike,

    // <script> and <style> bodies
    InRawText,
}

/// Quote type for attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QuoteType {
    NoValue = 0,
    Unquoted = 1,
    Single = 2,
    Double = 3,
}

/// Tokenizer callbacks
pub trait Callbacks {
    fn on_text(&mut self, start: usize, end: usize);

    fn on_open_tag_name(&mut self, start: usize, end: usize);
    fn on_open_tag_end(&mut self, end: usize);
    fn on_self_closing_tag(&mut self, end: usize);
    fn on_close_tag(&mut self, start: usize, end: usize);

    fn on_attrib_name(&mut self, start: usize, end: usize);
    fn on_attrib_data(&mut self, start: usize, end: usize);
    fn on_attrib_end(&mut self, quote: QuoteType, end: usize);

    fn on_comment(&mut self, start: usize, end: usize);
    fn on_declaration(&mut self, start: usize, end: usize);

    fn on_end(&mut self);
    fn on_error(&mut self, code: ErrorCode, index: usize);
}

/// Check if character is a tag start character (a-z, A-Z)
#[inline]
pub fn is_tag_start_char(c: u8) -> bool {
    (LOWER_A..=LOWER_Z).contains(&c) || (UPPER_A..=UPPER_Z).contains(&c)
}

/// Check if character is whitespace
#[inline]
pub fn is_whitespace(c: u8) -> bool {
    c == SPACE || c == NEWLINE || c == TAB || c == FORM_FEED || c == CARRIAGE_RETURN
}

/// Check if character ends a tag section
#[inline]
pub fn is_end_of_tag_section(c: u8) -> bool {
    c == SLASH || c == GT || is_whitespace(c)
}

/// HTML tokenizer
pub struct Tokenizer<'a, C: Callbacks> {
    /// Input source
    input: &'a [u8],
    /// Current state
    state: State,
    /// Buffer start position
    section_start: usize,
    /// Current index
    index: usize,
    /// Callbacks
    callbacks: C,
    /// Fragment open marker
    marker_open: &'a [u8],
    /// Fragment close marker
    marker_close: &'a [u8],
    /// Tag whose end tag closes the current raw text section
    raw_tag: Option<&'a [u8]>,
    /// Name of the tag currently being opened
    open_tag: Option<&'a [u8]>,
}

impl<'a, C: Callbacks> Tokenizer<'a, C> {
    /// Create a new tokenizer
    pub fn new(input: &'a str, callbacks: C) -> Self {
        Self::with_markers(input, callbacks, b"[[", b"]]")
    }

    /// Create a new tokenizer with custom fragment markers
    pub fn with_markers(
        input: &'a str,
        callbacks: C,
        marker_open: &'a [u8],
        marker_close: &'a [u8],
    ) -> Self {
        Self {
            input: input.as_bytes(),
            state: State::Text,
            section_start: 0,
            index: 0,
            callbacks,
            marker_open,
            marker_close,
            raw_tag: None,
            open_tag: None,
        }
    }

    /// Tokenize the input and hand back the callbacks
    pub fn tokenize(mut self) -> C {
        while self.index < self.input.len() {
            let c = self.input[self.index];

            match self.state {
                State::Text => self.state_text(c),
                State::BeforeTagName => self.state_before_tag_name(c),
                State::InTagName => self.state_in_tag_name(c),
                State::InSelfClosingTag => self.state_in_self_closing_tag(c),
                State::BeforeClosingTagName => self.state_before_closing_tag_name(c),
                State::InClosingTagName => self.state_in_closing_tag_name(c),
                State::AfterClosingTagName => self.state_after_closing_tag_name(c),
                State::BeforeAttrName => self.state_before_attr_name(c),
                State::InAttrName => self.state_in_attr_name(c),
                State::AfterAttrName => self.state_after_attr_name(c),
                State::BeforeAttrValue => self.state_before_attr_value(c),
                State::InAttrValueDq => self.state_in_attr_value_quoted(c, DOUBLE_QUOTE),
                State::InAttrValueSq => self.state_in_attr_value_quoted(c, SINGLE_QUOTE),
                State::InAttrValueNq => self.state_in_attr_value_nq(c),
                State::BeforeDeclaration => self.state_before_declaration(c),
                State::InDeclaration => self.state_in_declaration(c),
                State::InProcessingInstruction => self.state_in_processing_instruction(c),
                State::BeforeComment => self.state_before_comment(c),
                State::InCommentLike => self.state_in_comment_like(c),
                State::InRawText => self.state_in_raw_text(c),
            }

            self.index += 1;
        }

        // Handle remaining content
        self.cleanup();
        self.callbacks.on_end();
        self.callbacks
    }

    fn cleanup(&mut self) {
        if self.section_start < self.index {
            match self.state {
                State::Text | State::InRawText => {
                    self.callbacks.on_text(self.section_start, self.index);
                }
                State::InTagName
                | State::BeforeClosingTagName
                | State::InClosingTagName
                | State::BeforeAttrName
                | State::InAttrName
                | State::AfterAttrName
                | State::BeforeAttrValue
                | State::InAttrValueDq
                | State::InAttrValueSq
                | State::InAttrValueNq => {
                    self.callbacks.on_error(ErrorCode::EofInTag, self.index);
                }
                State::InCommentLike => {
                    self.callbacks.on_error(ErrorCode::EofInComment, self.index);
                    self.callbacks.on_comment(self.section_start, self.index);
                }
                _ => {}
            }
        }
    }

    /// If a fragment opens at the current index, move the index onto the last
    /// byte of its closing marker. Unterminated fragments are left alone.
    fn skip_fragment(&mut self) -> bool {
        if self.marker_open.is_empty() || !self.input[self.index..].starts_with(self.marker_open) {
            return false;
        }
        let content_start = self.index + self.marker_open.len();
        match find_marker_close(self.input, content_start, self.marker_close) {
            Some(close) => {
                self.index = close + self.marker_close.len() - 1;
                true
            }
            None => false,
        }
    }

    // ========== State handlers ==========

    fn state_text(&mut self, c: u8) {
        if c == LT {
            if self.index > self.section_start {
                self.callbacks.on_text(self.section_start, self.index);
            }
            self.state = State::BeforeTagName;
            self.section_start = self.index;
        } else {
            self.skip_fragment();
        }
    }

    fn state_before_tag_name(&mut self, c: u8) {
        if c == EXCLAMATION_MARK {
            self.state = State::BeforeDeclaration;
            self.section_start = self.index + 1;
        } else if c == QUESTION_MARK {
            self.state = State::InProcessingInstruction;
            self.section_start = self.index + 1;
        } else if is_tag_start_char(c) {
            self.section_start = self.index;
            self.state = State::InTagName;
        } else if c == SLASH {
            self.state = State::BeforeClosingTagName;
        } else {
            // Not a tag after all; the `<` stays part of the text.
            self.state = State::Text;
            self.state_text(c);
        }
    }

    fn state_in_tag_name(&mut self, c: u8) {
        if is_end_of_tag_section(c) {
            self.callbacks.on_open_tag_name(self.section_start, self.index);
            self.open_tag = Some(&self.input[self.section_start..self.index]);
            self.section_start = self.index;
            self.state = State::BeforeAttrName;
            self.state_before_attr_name(c);
        }
    }

    fn state_in_self_closing_tag(&mut self, c: u8) {
        if c == GT {
            self.callbacks.on_self_closing_tag(self.index);
            self.open_tag = None;
            self.state = State::Text;
            self.section_start = self.index + 1;
        } else if !is_whitespace(c) {
            self.state = State::BeforeAttrName;
            self.state_before_attr_name(c);
        }
    }

    fn state_before_closing_tag_name(&mut self, c: u8) {
        if is_whitespace(c) {
            // Skip
        } else if c == GT {
            self.callbacks.on_error(ErrorCode::MissingEndTagName, self.index);
            self.state = State::Text;
            self.section_start = self.index + 1;
        } else {
            self.state = State::InClosingTagName;
            self.section_start = self.index;
        }
    }

    fn state_in_closing_tag_name(&mut self, c: u8) {
        if c == GT || is_whitespace(c) {
            self.callbacks.on_close_tag(self.section_start, self.index);
            self.section_start = self.index + 1;
            self.state = if c == GT {
                State::Text
            } else {
                State::AfterClosingTagName
            };
        }
    }

    fn state_after_closing_tag_name(&mut self, c: u8) {
        if c == GT {
            self.state = State::Text;
            self.section_start = self.index + 1;
        }
    }

    fn state_before_attr_name(&mut self, c: u8) {
        if c == GT {
            self.callbacks.on_open_tag_end(self.index);
            self.section_start = self.index + 1;
            self.state = match self.open_tag.take() {
                Some(tag) if is_raw_text_tag(&String::from_utf8_lossy(tag)) => {
                    self.raw_tag = Some(tag);
                    State::InRawText
                }
                _ => State::Text,
            };
        } else if c == SLASH {
            self.state = State::InSelfClosingTag;
        } else if !is_whitespace(c) {
            self.state = State::InAttrName;
            self.section_start = self.index;
        }
    }

    fn state_in_attr_name(&mut self, c: u8) {
        if c == EQ || is_end_of_tag_section(c) {
            self.callbacks.on_attrib_name(self.section_start, self.index);
            self.section_start = self.index;
            self.state = State::AfterAttrName;
            self.state_after_attr_name(c);
        }
    }

    fn state_after_attr_name(&mut self, c: u8) {
        if c == EQ {
            self.state = State::BeforeAttrValue;
        } else if c == SLASH || c == GT {
            self.callbacks.on_attrib_end(QuoteType::NoValue, self.index);
            self.state = State::BeforeAttrName;
            self.state_before_attr_name(c);
        } else if !is_whitespace(c) {
            self.callbacks.on_attrib_end(QuoteType::NoValue, self.index);
            self.state = State::InAttrName;
            self.section_start = self.index;
        }
    }

    fn state_before_attr_value(&mut self, c: u8) {
        if c == DOUBLE_QUOTE {
            self.state = State::InAttrValueDq;
            self.section_start = self.index + 1;
        } else if c == SINGLE_QUOTE {
            self.state = State::InAttrValueSq;
            self.section_start = self.index + 1;
        } else if !is_whitespace(c) {
            self.section_start = self.index;
            self.state = State::InAttrValueNq;
            self.state_in_attr_value_nq(c);
        }
    }

    fn state_in_attr_value_quoted(&mut self, c: u8, quote: u8) {
        if c == quote {
            let kind = if quote == DOUBLE_QUOTE {
                QuoteType::Double
            } else {
                QuoteType::Single
            };
            self.emit_attr_value(kind);
        } else {
            self.skip_fragment();
        }
    }

    fn state_in_attr_value_nq(&mut self, c: u8) {
        if is_whitespace(c) || c == GT {
            self.emit_attr_value(QuoteType::Unquoted);
            self.state_before_attr_name(c);
        } else if !self.skip_fragment() && c == SLASH && self.input.get(self.index + 1) == Some(&GT)
        {
            self.emit_attr_value(QuoteType::Unquoted);
            self.state = State::InSelfClosingTag;
        }
    }

    fn emit_attr_value(&mut self, quote: QuoteType) {
        if self.section_start < self.index {
            self.callbacks.on_attrib_data(self.section_start, self.index);
        }
        self.callbacks.on_attrib_end(quote, self.index);
        self.section_start = self.index + 1;
        self.state = State::BeforeAttrName;
    }

    fn state_before_declaration(&mut self, c: u8) {
        if c == DASH {
            self.state = State::BeforeComment;
            self.section_start = self.index + 1;
        } else {
            self.state = State::InDeclaration;
        }
    }

    fn state_in_declaration(&mut self, c: u8) {
        if c == GT {
            self.callbacks.on_declaration(self.section_start, self.index);
            self.state = State::Text;
            self.section_start = self.index + 1;
        }
    }

    fn state_in_processing_instruction(&mut self, c: u8) {
        if c == GT {
            self.state = State::Text;
            self.section_start = self.index + 1;
        }
    }

    fn state_before_comment(&mut self, c: u8) {
        if c == DASH {
            self.state = State::InCommentLike;
            self.section_start = self.index + 1;
        } else {
            self.state = State::InDeclaration;
        }
    }

    fn state_in_comment_like(&mut self, c: u8) {
        if c == DASH
            && self.index + 2 < self.input.len()
            && self.input[self.index + 1] == DASH
            && self.input[self.index + 2] == GT
        {
            self.callbacks.on_comment(self.section_start, self.index);
            self.index += 2;
            self.state = State::Text;
            self.section_start = self.index + 1;
        }
    }

    fn state_in_raw_text(&mut self, c: u8) {
        if c != LT || self.input.get(self.index + 1) != Some(&SLASH) {
            return;
        }
        let Some(tag) = self.raw_tag else {
            return;
        };
        let name_start = self.index + 2;
        let name_end = name_start + tag.len();
        let matches = self
            .input
            .get(name_start..name_end)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
            && self
                .input
                .get(name_end)
                .map_or(true, |&b| is_end_of_tag_section(b));
        if matches {
            if self.index > self.section_start {
                self.callbacks.on_text(self.section_start, self.index);
            }
            self.raw_tag = None;
            self.section_start = self.index;
            self.state = State::BeforeTagName;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder<'s> {
        source: &'s str,
        events: Vec<String>,
    }

    impl Callbacks for Recorder<'_> {
        fn on_text(&mut self, start: usize, end: usize) {
            self.events.push(format!("text:{}", &self.source[start..end]));
        }
        fn on_open_tag_name(&mut self, start: usize, end: usize) {
            self.events.push(format!("open:{}", &self.source[start..end]));
        }
        fn on_open_tag_end(&mut self, _end: usize) {
            self.events.push("open-end".into());
        }
        fn on_self_closing_tag(&mut self, _end: usize) {
            self.events.push("self-close".into());
        }
        fn on_close_tag(&mut self, start: usize, end: usize) {
            self.events.push(format!("close:{}", &self.source[start..end]));
        }
        fn on_attrib_name(&mut self, start: usize, end: usize) {
            self.events.push(format!("attr:{}", &self.source[start..end]));
        }
        fn on_attrib_data(&mut self, start: usize, end: usize) {
            self.events.push(format!("value:{}", &self.source[start..end]));
        }
        fn on_attrib_end(&mut self, _quote: QuoteType, _end: usize) {}
        fn on_comment(&mut self, start: usize, end: usize) {
            self.events.push(format!("comment:{}", &self.source[start..end]));
        }
        fn on_declaration(&mut self, start: usize, end: usize) {
            self.events.push(format!("decl:{}", &self.source[start..end]));
        }
        fn on_end(&mut self) {}
        fn on_error(&mut self, code: ErrorCode, _index: usize) {
            self.events.push(format!("error:{code:?}"));
        }
    }

    fn events(source: &str) -> Vec<String> {
        Tokenizer::new(
            source,
            Recorder {
                source,
                events: Vec::new(),
            },
        )
        .tokenize()
        .events
    }

    #[test]
    fn test_basic_tags() {
        assert_eq!(
            events("<p id=a>hi</p>"),
            ["open:p", "attr:id", "value:a", "open-end", "text:hi", "close:p"]
        );
    }

    #[test]
    fn test_fragment_in_text_hides_lt() {
        assert_eq!(
            events("<b>[[ a < b ]]</b>"),
            ["open:b", "open-end", "text:[[ a < b ]]", "close:b"]
        );
    }

    #[test]
    fn test_fragment_in_attribute_values() {
        assert_eq!(
            events(r#"<i v=[[ a > b ]] t="[[ "x" ]]">"#),
            [
                "open:i",
                "attr:v",
                "value:[[ a > b ]]",
                "attr:t",
                r#"value:[[ "x" ]]"#,
                "open-end"
            ]
        );
    }

    #[test]
    fn test_raw_text_and_declarations() {
        assert_eq!(
            events("<!DOCTYPE html><script>if (a<b) {}</script><!--c-->"),
            [
                "decl:DOCTYPE html",
                "open:script",
                "open-end",
                "text:if (a<b) {}",
                "close:script",
                "comment:c"
            ]
        );
    }

    #[test]
    fn test_unterminated_tag() {
        assert_eq!(events("<div a"), ["open:div", "error:EofInTag"]);
    }
}
