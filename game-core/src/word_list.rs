use anyhow::{Context, Result, anyhow};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::path::Path;

/// Candidate secret words, loaded once at startup.
#[derive(Debug)]
pub struct WordList {
    words: Vec<String>,
}

impl WordList {
    /// Build a word list from newline separated text. Blank lines and `#` comments are skipped.
    pub fn from_word_list(word_list: &str) -> Self {
        let words = word_list
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        Self { words }
    }

    /// Read a word list file. An unreadable or empty file is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read word list '{}'", path.display()))?;

        let list = Self::from_word_list(&contents);
        if list.is_empty() {
            return Err(anyhow!("Word list '{}' contains no words", path.display()));
        }

        tracing::info!("Loaded {} words from {}", list.len(), path.display());
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Pick a secret word uniformly at random
    pub fn random_word(&self) -> Result<String> {
        self.random_word_with(&mut rand::rng())
    }

    pub fn random_word_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String> {
        self.words
            .choose(rng)
            .cloned()
            .ok_or_else(|| anyhow!("No words available"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_word_list_parsing() {
        let word_list = "사과\n바나나\n# comment\n\n   \n  기린  \n";
        let list = WordList::from_word_list(word_list);

        assert_eq!(list.words, vec!["사과", "바나나", "기린"]);
    }

    #[test]
    fn test_empty_word_list() {
        let list = WordList::from_word_list("# only a comment\n\n");
        assert!(list.is_empty());

        let result = list.random_word();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("No words available"));
    }

    #[test]
    fn test_random_word_comes_from_list() {
        let list = WordList::from_word_list("연필\n지우개\n공책");
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let word = list.random_word_with(&mut rng).unwrap();
            assert!(list.words.contains(&word));
        }
    }

    #[test]
    fn test_load_missing_file() {
        let result = WordList::load("/definitely/not/here/items.txt");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to read word list"));
    }

    #[test]
    fn test_load_file_without_words() {
        let path = std::env::temp_dir().join(format!("empty-words-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "\n# nothing here\n").unwrap();

        let result = WordList::load(&path);
        std::fs::remove_file(&path).ok();

        assert!(result.unwrap_err().to_string().contains("contains no words"));
    }
}
