//! Separation of `<think>` reasoning spans from answer text.
//!
//! Models that reason out loud wrap that text in `<think>` … `</think>` inside the
//! regular content stream. Streamed fragments arrive at arbitrary boundaries, so a
//! marker can be cut anywhere (`"<thi"` + `"nk>"`). [`ThinkingSplitter`] holds back
//! just enough trailing text to recognise a marker once the rest of it arrives and
//! never emits the same byte twice.

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// A classified piece of model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    ThinkingStart,
    Thinking(String),
    ThinkingEnd,
    Answer(String),
}

/// Incremental splitter for content carrying `<think>` blocks
#[derive(Debug, Default)]
pub struct ThinkingSplitter {
    in_thinking: bool,
    pending: String,
}

impl ThinkingSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the splitter is currently inside a thinking block
    pub fn is_thinking(&self) -> bool {
        self.in_thinking
    }

    /// Classify the next content fragment.
    ///
    /// Trailing text that could be the start of the next marker is kept back and
    /// prepended to the following fragment.
    pub fn feed(&mut self, fragment: &str) -> Vec<Segment> {
        let mut text = std::mem::take(&mut self.pending);
        text.push_str(fragment);

        let mut segments = Vec::new();
        let mut rest = text.as_str();

        loop {
            let tag = self.expected_tag();
            match rest.find(tag) {
                Some(pos) => {
                    self.push_text(&mut segments, &rest[..pos]);
                    segments.push(if self.in_thinking {
                        Segment::ThinkingEnd
                    } else {
                        Segment::ThinkingStart
                    });
                    self.in_thinking = !self.in_thinking;
                    rest = &rest[pos + tag.len()..];
                }
                None => {
                    // Tags are ASCII, so the split point is always a char boundary.
                    let keep = partial_tag_len(rest, tag);
                    let (emit, hold) = rest.split_at(rest.len() - keep);
                    self.push_text(&mut segments, emit);
                    self.pending = hold.to_string();
                    break;
                }
            }
        }

        segments
    }

    /// Flush held-back text at the end of the stream.
    ///
    /// A block left open is not closed: no [`Segment::ThinkingEnd`] is emitted.
    pub fn finish(&mut self) -> Vec<Segment> {
        let pending = std::mem::take(&mut self.pending);
        let mut segments = Vec::new();
        self.push_text(&mut segments, &pending);
        segments
    }

    fn expected_tag(&self) -> &'static str {
        if self.in_thinking {
            THINK_CLOSE
        } else {
            THINK_OPEN
        }
    }

    fn push_text(&self, segments: &mut Vec<Segment>, text: &str) {
        if text.is_empty() {
            return;
        }

        match (segments.last_mut(), self.in_thinking) {
            (Some(Segment::Thinking(last)), true) | (Some(Segment::Answer(last)), false) => {
                last.push_str(text)
            }
            (_, true) => segments.push(Segment::Thinking(text.to_string())),
            (_, false) => segments.push(Segment::Answer(text.to_string())),
        }
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `tag`
fn partial_tag_len(text: &str, tag: &str) -> usize {
    (1..tag.len()).rev().find(|&k| text.ends_with(&tag[..k])).unwrap_or(0)
}

/// Final answer and reasoning text of one reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledResponse {
    pub answer: String,
    pub thinking: String,
}

impl AssembledResponse {
    pub fn has_thinking(&self) -> bool {
        !self.thinking.is_empty()
    }
}

/// Accumulates classified output into an [`AssembledResponse`]
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    response: AssembledResponse,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: &Segment) {
        match segment {
            Segment::Thinking(text) => self.push_thinking(text),
            Segment::Answer(text) => self.push_answer(text),
            Segment::ThinkingStart | Segment::ThinkingEnd => {}
        }
    }

    pub fn push_answer(&mut self, text: &str) {
        self.response.answer.push_str(text);
    }

    pub fn push_thinking(&mut self, text: &str) {
        self.response.thinking.push_str(text);
    }

    pub fn answer(&self) -> &str {
        &self.response.answer
    }

    pub fn finish(self) -> AssembledResponse {
        self.response
    }
}

/// Split a complete, non-streamed reply
pub fn split_complete(text: &str) -> AssembledResponse {
    let mut splitter = ThinkingSplitter::new();
    let mut assembler = ResponseAssembler::new();

    for segment in splitter.feed(text).iter().chain(splitter.finish().iter()) {
        assembler.push(segment);
    }

    assembler.finish()
}
