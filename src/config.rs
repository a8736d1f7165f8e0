use crate::error::{Result, TabixError};

/// Bit set in the on-disk preset when coordinates are 0-based half-open (UCSC style).
pub const FLAG_UCSC: i32 = 0x10000;

/// How the coordinate columns of a record are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Begin/end read from the configured columns.
    #[default]
    Generic,
    /// End derived from the CIGAR string in column 6.
    Sam,
    /// End derived from REF length or an `END=` INFO key.
    Vcf,
}

impl Preset {
    pub fn code(self) -> i32 {
        match self {
            Preset::Generic => 0,
            Preset::Sam => 1,
            Preset::Vcf => 2,
        }
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Preset::Generic),
            1 => Some(Preset::Sam),
            2 => Some(Preset::Vcf),
            _ => None,
        }
    }
}

/// Record interpretation settings, stored verbatim in the index header.
///
/// Column numbers are 1-based; `end_col == 0` means there is no end column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabixConfig {
    pub preset: Preset,
    pub zero_based: bool,
    pub seq_col: i32,
    pub begin_col: i32,
    pub end_col: i32,
    pub comment_char: u8,
    pub lines_to_skip: i32,
}

impl Default for TabixConfig {
    fn default() -> Self {
        TabixConfig::gff()
    }
}

impl TabixConfig {
    pub fn gff() -> Self {
        TabixConfig {
            preset: Preset::Generic,
            zero_based: false,
            seq_col: 1,
            begin_col: 4,
            end_col: 5,
            comment_char: b'#',
            lines_to_skip: 0,
        }
    }

    pub fn bed() -> Self {
        TabixConfig {
            preset: Preset::Generic,
            zero_based: true,
            seq_col: 1,
            begin_col: 2,
            end_col: 3,
            comment_char: b'#',
            lines_to_skip: 0,
        }
    }

    pub fn psltbl() -> Self {
        TabixConfig {
            preset: Preset::Generic,
            zero_based: true,
            seq_col: 15,
            begin_col: 17,
            end_col: 18,
            comment_char: b'#',
            lines_to_skip: 0,
        }
    }

    pub fn sam() -> Self {
        TabixConfig {
            preset: Preset::Sam,
            zero_based: false,
            seq_col: 3,
            begin_col: 4,
            end_col: 0,
            comment_char: b'@',
            lines_to_skip: 0,
        }
    }

    pub fn vcf() -> Self {
        TabixConfig {
            preset: Preset::Vcf,
            zero_based: false,
            seq_col: 1,
            begin_col: 2,
            end_col: 0,
            comment_char: b'#',
            lines_to_skip: 0,
        }
    }

    /// Look up one of the named presets (`gff`, `bed`, `psltbl`, `sam`, `vcf`).
    pub fn from_preset_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "gff" => Some(TabixConfig::gff()),
            "bed" => Some(TabixConfig::bed()),
            "psltbl" => Some(TabixConfig::psltbl()),
            "sam" => Some(TabixConfig::sam()),
            "vcf" => Some(TabixConfig::vcf()),
            _ => None,
        }
    }

    /// Guess a preset from a data file name, ignoring a trailing `.gz`/`.bgz`.
    pub fn from_path(path: &str) -> Option<Self> {
        let stem = path
            .strip_suffix(".gz")
            .or_else(|| path.strip_suffix(".bgz"))
            .unwrap_or(path);
        let ext = stem.rsplit('.').next()?;
        match ext.to_ascii_lowercase().as_str() {
            "gff" | "gff3" | "gtf" => Some(TabixConfig::gff()),
            "bed" => Some(TabixConfig::bed()),
            "sam" => Some(TabixConfig::sam()),
            "vcf" => Some(TabixConfig::vcf()),
            _ => None,
        }
    }

    /// The preset word as written to disk.
    pub fn preset_word(&self) -> i32 {
        let flag = if self.zero_based { FLAG_UCSC } else { 0 };
        self.preset.code() | flag
    }

    /// Rebuild a configuration from the raw header fields.
    pub fn from_header(
        preset_word: i32,
        seq_col: i32,
        begin_col: i32,
        end_col: i32,
        comment_char: i32,
        lines_to_skip: i32,
    ) -> Result<Self> {
        let preset = Preset::from_code(preset_word & 0xffff).ok_or_else(|| {
            TabixError::CorruptIndex(format!("unknown preset {:#x}", preset_word))
        })?;
        if seq_col < 1 || begin_col < 1 || end_col < 0 {
            return Err(TabixError::CorruptIndex(format!(
                "invalid columns seq={seq_col} begin={begin_col} end={end_col}"
            )));
        }
        let comment_char = u8::try_from(comment_char).map_err(|_| {
            TabixError::CorruptIndex(format!("invalid comment character {comment_char}"))
        })?;
        Ok(TabixConfig {
            preset,
            zero_based: preset_word & FLAG_UCSC != 0,
            seq_col,
            begin_col,
            end_col,
            comment_char,
            lines_to_skip: lines_to_skip.max(0),
        })
    }

    /// Whether `line` is a header line by the comment convention.
    pub fn is_comment(&self, line: &str) -> bool {
        line.as_bytes().first() == Some(&self.comment_char)
    }

    /// Highest 1-based column the interval parser looks at.
    pub fn max_column(&self) -> usize {
        let configured = self.seq_col.max(self.begin_col).max(self.end_col) as usize;
        match self.preset {
            Preset::Generic => configured,
            Preset::Sam => configured.max(6),
            Preset::Vcf => configured.max(8),
        }
    }
}
