//! Sentence-aware chunking.

use crate::memory::estimate_tokens;
use crate::rag::document::Document;

/// A contiguous slice of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// `{document_id}_{index}`
    pub id: String,
    pub document_id: String,
    pub index: usize,
    pub text: String,
}

/// Splits documents into chunks of at most `chunk_size` estimated tokens,
/// preferring paragraph and sentence boundaries. Consecutive chunks share
/// roughly `chunk_overlap` tokens of trailing context.
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut pieces = Vec::new();
        for sentence in split_sentences(&document.text) {
            if estimate_tokens(sentence) > self.chunk_size {
                pieces.extend(split_words(sentence, self.chunk_size * 4));
            } else {
                pieces.push(sentence.to_string());
            }
        }

        let mut texts: Vec<String> = Vec::new();
        let mut current = String::new();
        for piece in pieces {
            let candidate = join_piece(&current, &piece);
            if current.is_empty() || estimate_tokens(&candidate) <= self.chunk_size {
                current = candidate;
                continue;
            }

            let overlap = tail_chars(&current, self.chunk_overlap * 4).to_string();
            texts.push(std::mem::take(&mut current));
            let seeded = join_piece(&overlap, &piece);
            current = if estimate_tokens(&seeded) <= self.chunk_size {
                seeded
            } else {
                piece
            };
        }
        if !current.trim().is_empty() {
            texts.push(current);
        }

        texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                id: format!("{}_{index}", document.id),
                document_id: document.id.clone(),
                index,
                text,
            })
            .collect()
    }
}

fn join_piece(current: &str, piece: &str) -> String {
    if current.is_empty() {
        piece.to_string()
    } else {
        format!("{current} {piece}")
    }
}

/// Split on paragraph breaks and sentence-ending punctuation, keeping the
/// punctuation with its sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    for paragraph in text.split("\n\n") {
        let mut start = 0;
        let bytes = paragraph.as_bytes();
        for (i, &b) in bytes.iter().enumerate() {
            let ends_sentence = matches!(b, b'.' | b'!' | b'?')
                && bytes.get(i + 1).map_or(true, |next| next.is_ascii_whitespace());
            if ends_sentence {
                let sentence = paragraph[start..=i].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = i + 1;
            }
        }
        let rest = paragraph[start..].trim();
        if !rest.is_empty() {
            sentences.push(rest);
        }
    }
    sentences
}

/// Break an oversized sentence on word boundaries into pieces of at most
/// `max_chars` characters. A single word longer than that stays whole.
fn split_words(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for word in sentence.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn tail_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let skip = total - max_chars;
    let byte_start = text.char_indices().nth(skip).map_or(text.len(), |(i, _)| i);
    // Start the overlap on a word boundary.
    let tail = &text[byte_start..];
    tail.find(' ').map_or(tail, |i| tail[i + 1..].trim_start())
}
