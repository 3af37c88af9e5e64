use std::fmt;
use std::io;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Psl {
    pub match_count: u32,
    pub mismatch_count: u32,
    pub rep_match: u32,
    pub n_count: u32,
    pub q_num_insert: u32,
    pub q_base_insert: i32,
    pub t_num_insert: u32,
    pub t_base_insert: i32,
    pub strand: String, // "+", "-", "++", "+-"
    pub q_name: String,
    pub q_size: u32,
    pub q_start: i32,
    pub q_end: i32,
    pub t_name: String,
    pub t_size: u32,
    pub t_start: i32,
    pub t_end: i32,
    pub block_count: u32,
    pub block_sizes: Vec<u32>,
    pub q_starts: Vec<u32>,
    pub t_starts: Vec<u32>,
}

impl Psl {
    /// A single gap-free block of `len` perfectly matching bases.
    ///
    /// `q_start` is given on the strand of the alignment, as in the block starts.
    ///
    /// ```
    /// use oog::libs::psl::Psl;
    /// let psl = Psl::ungapped("a", 1000, 800, "b", 1000, 0, 200, "+");
    /// assert_eq!(psl.q_end, 1000);
    /// assert_eq!(psl.t_end, 200);
    /// assert_eq!(psl.match_count, 200);
    ///
    /// let psl = Psl::ungapped("a", 1000, 0, "b", 1000, 0, 200, "-");
    /// assert_eq!((psl.q_start, psl.q_end), (800, 1000));
    /// ```
    #[allow(clippy::too_many_arguments)]
    pub fn ungapped(
        q_name: &str,
        q_size: u32,
        q_start: u32,
        t_name: &str,
        t_size: u32,
        t_start: u32,
        len: u32,
        strand: &str,
    ) -> Self {
        let (qs, qe) = if strand.starts_with('-') {
            (q_size - (q_start + len), q_size - q_start)
        } else {
            (q_start, q_start + len)
        };
        Psl {
            match_count: len,
            strand: strand.to_string(),
            q_name: q_name.to_string(),
            q_size,
            q_start: qs as i32,
            q_end: qe as i32,
            t_name: t_name.to_string(),
            t_size,
            t_start: t_start as i32,
            t_end: (t_start + len) as i32,
            block_count: 1,
            block_sizes: vec![len],
            q_starts: vec![q_start],
            t_starts: vec![t_start],
            ..Default::default()
        }
    }

    pub fn is_protein(&self) -> bool {
        if self.block_count == 0 {
            return false;
        }
        let last = (self.block_count as usize) - 1;
        let t_strand = self.strand.chars().nth(1).unwrap_or('+');

        let t_end = self.t_end as u32;
        let t_start = self.t_start as u32;
        let t_size = self.t_size;
        let t_start_last = self.t_starts[last];
        let block_size_last = self.block_sizes[last];

        if t_strand == '+' {
            t_end == t_start_last + 3 * block_size_last
        } else if t_strand == '-' {
            t_start == t_size - (t_start_last + 3 * block_size_last)
        } else {
            false
        }
    }

    /// +1 when query and target run the same way, -1 otherwise.
    pub fn orientation(&self) -> i8 {
        let mut chars = self.strand.chars();
        let q = chars.next().unwrap_or('+');
        match chars.next() {
            Some('-') => {
                if q == '-' {
                    1
                } else {
                    -1
                }
            }
            _ => {
                if q == '-' {
                    -1
                } else {
                    1
                }
            }
        }
    }

    pub fn is_q_forward(&self) -> bool {
        !self.strand.starts_with('-')
    }

    /// Badness of the alignment in parts per thousand.
    ///
    /// Transcripts (`is_mrna`) are not charged for introns, so gaps on the target side are free.
    pub fn milli_bad(&self, is_mrna: bool) -> i32 {
        let size_mul = if self.is_protein() { 3 } else { 1 };
        let q_ali = size_mul * (self.q_end - self.q_start);
        let t_ali = self.t_end - self.t_start;
        let ali_size = q_ali.min(t_ali);
        if ali_size <= 0 {
            return 0;
        }

        let mut size_dif = q_ali - t_ali;
        if size_dif < 0 {
            size_dif = if is_mrna { 0 } else { -size_dif };
        }
        let mut insert_factor = self.q_num_insert as i32;
        if !is_mrna {
            insert_factor += self.t_num_insert as i32;
        }

        let total = size_mul * (self.match_count + self.rep_match + self.mismatch_count) as i32;
        if total == 0 {
            return 0;
        }
        let bad = size_mul * self.mismatch_count as i32
            + insert_factor
            + (3.0 * (1.0 + size_dif as f64).ln()).round() as i32;
        1000 * bad / total
    }

    /// Unaligned bases at the (start, end) of the query, in target direction.
    pub fn q_floppy(&self) -> (i32, i32) {
        let q_size = self.q_size as i32;
        if self.is_q_forward() {
            (self.q_start, q_size - self.q_end)
        } else {
            (q_size - self.q_end, self.q_start)
        }
    }

    pub fn t_floppy(&self) -> (i32, i32) {
        (self.t_start, self.t_size as i32 - self.t_end)
    }

    /// Total unaligned bases at both ends of the alignment, the smaller side at each end.
    pub fn tails(&self) -> i32 {
        let (qs, qe) = self.q_floppy();
        let (ts, te) = self.t_floppy();
        qs.min(ts) + qe.min(te)
    }
}

impl std::str::FromStr for Psl {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split('\t').collect();
        if fields.len() < 21 {
            return Err(anyhow::anyhow!("Invalid PSL line: fewer than 21 columns"));
        }

        let parse_u32 = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| anyhow::anyhow!("Invalid u32: {}", s))
        };
        let parse_i32 = |s: &str| {
            s.parse::<i32>()
                .map_err(|_| anyhow::anyhow!("Invalid i32: {}", s))
        };
        let parse_vec = |s: &str| -> Result<Vec<u32>, anyhow::Error> {
            s.split(',')
                .filter(|v| !v.is_empty())
                .map(|v| {
                    v.parse::<u32>()
                        .map_err(|_| anyhow::anyhow!("Invalid array val: {}", v))
                })
                .collect()
        };

        let psl = Psl {
            match_count: parse_u32(fields[0])?,
            mismatch_count: parse_u32(fields[1])?,
            rep_match: parse_u32(fields[2])?,
            n_count: parse_u32(fields[3])?,
            q_num_insert: parse_u32(fields[4])?,
            q_base_insert: parse_i32(fields[5])?,
            t_num_insert: parse_u32(fields[6])?,
            t_base_insert: parse_i32(fields[7])?,
            strand: fields[8].to_string(),
            q_name: fields[9].to_string(),
            q_size: parse_u32(fields[10])?,
            q_start: parse_i32(fields[11])?,
            q_end: parse_i32(fields[12])?,
            t_name: fields[13].to_string(),
            t_size: parse_u32(fields[14])?,
            t_start: parse_i32(fields[15])?,
            t_end: parse_i32(fields[16])?,
            block_count: parse_u32(fields[17])?,
            block_sizes: parse_vec(fields[18])?,
            q_starts: parse_vec(fields[19])?,
            t_starts: parse_vec(fields[20])?,
        };

        // Block arrays drive crossover selection, so a short array is an error here
        let n = psl.block_count as usize;
        if psl.block_sizes.len() != n || psl.q_starts.len() != n || psl.t_starts.len() != n {
            return Err(anyhow::anyhow!(
                "Invalid PSL line: blockCount {} does not match block arrays",
                n
            ));
        }
        if psl.q_start > psl.q_end || psl.t_start > psl.t_end {
            return Err(anyhow::anyhow!("Invalid PSL line: start after end"));
        }

        Ok(psl)
    }
}

/// Column header written by aligners in the psLayout format.
pub const PSL_HEADER: &str = "psLayout version 3

match\tmis- \trep. \tN's\tQ gap\tQ gap\tT gap\tT gap\tstrand\tQ        \tQ   \tQ    \tQ  \tT        \tT   \tT    \tT  \tblock\tblockSizes \tqStarts\t tStarts
     \tmatch\tmatch\t   \tcount\tbases\tcount\tbases\t      \tname     \tsize\tstart\tend\tname     \tsize\tstart\tend\tcount
---------------------------------------------------------------------------------------------------------------------------------------------------------------
";

pub fn write_header<W: io::Write>(w: &mut W) -> io::Result<()> {
    w.write_all(PSL_HEADER.as_bytes())
}

impl Psl {
    pub fn write_to<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        write!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t",
            self.match_count,
            self.mismatch_count,
            self.rep_match,
            self.n_count,
            self.q_num_insert,
            self.q_base_insert,
            self.t_num_insert,
            self.t_base_insert,
            self.strand,
            self.q_name,
            self.q_size,
            self.q_start,
            self.q_end,
            self.t_name,
            self.t_size,
            self.t_start,
            self.t_end,
            self.block_count
        )?;

        for s in &self.block_sizes {
            write!(w, "{},", s)?;
        }
        write!(w, "\t")?;
        for s in &self.q_starts {
            write!(w, "{},", s)?;
        }
        write!(w, "\t")?;
        for s in &self.t_starts {
            write!(w, "{},", s)?;
        }

        writeln!(w)?;
        Ok(())
    }
}

impl fmt::Display for Psl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.write_to(&mut buf).map_err(|_| fmt::Error)?;
        let s = String::from_utf8_lossy(&buf);
        write!(f, "{}", s.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psl_display() {
        let psl = Psl {
            match_count: 59,
            mismatch_count: 13,
            rep_match: 0,
            n_count: 0,
            q_num_insert: 2,
            q_base_insert: 3,
            t_num_insert: 1,
            t_base_insert: 1,
            strand: "+".to_string(),
            q_name: "query".to_string(),
            q_size: 100,
            q_start: 10,
            q_end: 90,
            t_name: "target".to_string(),
            t_size: 200,
            t_start: 50,
            t_end: 130,
            block_count: 2,
            block_sizes: vec![40, 40],
            q_starts: vec![10, 50],
            t_starts: vec![50, 90],
        };

        let output = format!("{}", psl);
        let expected = "59\t13\t0\t0\t2\t3\t1\t1\t+\tquery\t100\t10\t90\ttarget\t200\t50\t130\t2\t40,40,\t10,50,\t50,90,";
        assert_eq!(output, expected);

        let back: Psl = output.parse().unwrap();
        assert_eq!(back.q_starts, vec![10, 50]);
    }

    #[test]
    fn test_header_lines_are_skipped_by_digit_test() {
        let mut buf = vec![];
        write_header(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert!(text
            .lines()
            .all(|l| !l.starts_with(|c: char| c.is_ascii_digit())));
    }

    #[test]
    fn test_parse_invalid() {
        let line = "59\t13"; // Too short
        let res: Result<Psl, _> = line.parse();
        assert!(res.is_err());

        let line = "invalid\t13\t0\t0\t2\t3\t1\t1\t+\tquery\t100\t10\t90\ttarget\t200\t50\t130\t2\t40,40,\t10,50,\t50,90,";
        let res: Result<Psl, _> = line.parse();
        assert!(res.is_err());

        // two blocks announced, one given
        let line = "59\t13\t0\t0\t2\t3\t1\t1\t+\tquery\t100\t10\t90\ttarget\t200\t50\t130\t2\t40,\t10,\t50,";
        let res: Result<Psl, _> = line.parse();
        assert!(res.is_err());
    }

    #[test]
    fn test_orientation() {
        let mut psl = Psl::default();
        for (strand, expect) in [("+", 1), ("-", -1), ("++", 1), ("+-", -1), ("-+", -1), ("--", 1)] {
            psl.strand = strand.to_string();
            assert_eq!(psl.orientation(), expect, "{}", strand);
        }
    }

    #[test]
    fn test_milli_bad() {
        // perfect
        let psl = Psl::ungapped("a", 1000, 800, "b", 1000, 0, 200, "+");
        assert_eq!(psl.milli_bad(false), 0);

        // 10 mismatches of 100 aligned
        let mut psl = Psl::ungapped("a", 100, 0, "b", 100, 0, 100, "+");
        psl.match_count = 90;
        psl.mismatch_count = 10;
        assert_eq!(psl.milli_bad(false), 100);

        // an intron on the target costs nothing for transcripts
        let mut psl = Psl::ungapped("m", 500, 0, "b", 5000, 0, 200, "+");
        psl.t_end = 2200;
        psl.t_num_insert = 1;
        assert_eq!(psl.milli_bad(true), 0);
        assert!(psl.milli_bad(false) > 0);
    }

    #[test]
    fn test_floppy() {
        // query aligned at its right end
        let psl = Psl::ungapped("a", 1000, 800, "b", 1000, 0, 200, "+");
        assert_eq!(psl.q_floppy(), (800, 0));
        assert_eq!(psl.t_floppy(), (0, 800));
        assert_eq!(psl.tails(), 0);

        let psl = Psl::ungapped("a", 1000, 800, "b", 1000, 0, 200, "-");
        assert_eq!((psl.q_start, psl.q_end), (0, 200));
        assert_eq!(psl.q_floppy(), (800, 0));
    }

    #[test]
    fn test_is_protein() {
        let mut psl = Psl::default();
        psl.block_count = 1;
        psl.block_sizes = vec![10];
        psl.t_starts = vec![0];
        psl.t_start = 0;
        psl.t_end = 30; // 3 * 10
        psl.strand = "+".to_string();
        psl.t_size = 100;

        assert!(psl.is_protein());

        psl.t_end = 10;
        assert!(!psl.is_protein());
    }
}
