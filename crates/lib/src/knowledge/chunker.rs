/// Word-window chunker with overlap.
#[derive(Debug, Clone)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            overlap: overlap.min(size - 1),
        }
    }

    /// Split text into chunks of at most `size` words; consecutive chunks share `overlap` words.
    /// Whitespace-only text yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }
        let step = self.size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.size).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(200, 20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let c = Chunker::new(10, 2);
        assert_eq!(c.split("free  shipping\nover $50"), vec!["free shipping over $50"]);
    }

    #[test]
    fn windows_overlap() {
        let c = Chunker::new(4, 1);
        let chunks = c.split("a b c d e f g");
        assert_eq!(chunks, vec!["a b c d", "d e f g"]);
    }

    #[test]
    fn overlap_is_capped_below_size() {
        let c = Chunker::new(2, 5);
        assert_eq!(c.split("a b c"), vec!["a b", "b c"]);
        assert!(c.split(" \n ").is_empty());
    }
}
