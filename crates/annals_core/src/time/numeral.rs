//! Chinese numeral normalization.
//!
//! Rewrites runs such as `二千`, `3百` or `一万亿` into Arabic digits so date
//! phrases can be read with plain digit patterns.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumeralChar {
    /// Positional digit (Arabic, full-width or Chinese).
    Digit(u8),
    /// `零`/`〇`: a digit in positional runs, a placeholder between units.
    Zero,
    /// `十百千`: scales only the digit directly before it.
    Unit(u128),
    /// `万亿兆`: compounding section scale.
    Section(u128),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Unit,
    Section,
}

fn classify(ch: char) -> Option<NumeralChar> {
    let class = match ch {
        '0'..='9' => NumeralChar::Digit(ch as u8 - b'0'),
        '０'..='９' => NumeralChar::Digit((ch as u32 - '０' as u32) as u8),
        '零' | '〇' => NumeralChar::Zero,
        '一' | '壹' => NumeralChar::Digit(1),
        '二' | '贰' | '两' => NumeralChar::Digit(2),
        '三' | '叁' => NumeralChar::Digit(3),
        '四' | '肆' => NumeralChar::Digit(4),
        '五' | '伍' => NumeralChar::Digit(5),
        '六' | '陆' => NumeralChar::Digit(6),
        '七' | '柒' => NumeralChar::Digit(7),
        '八' | '捌' => NumeralChar::Digit(8),
        '九' | '玖' => NumeralChar::Digit(9),
        '十' | '拾' => NumeralChar::Unit(10),
        '百' | '佰' => NumeralChar::Unit(100),
        '千' | '仟' => NumeralChar::Unit(1_000),
        '万' | '萬' => NumeralChar::Section(10_000),
        '亿' | '億' => NumeralChar::Section(100_000_000),
        '兆' => NumeralChar::Section(1_000_000_000_000),
        _ => return None,
    };
    Some(class)
}

/// Replaces every numeral run that contains a Chinese numeral character with
/// its decimal value. Pure Arabic runs and runs that overflow are kept as-is.
pub fn normalize_numerals(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut run = String::new();

    for ch in text.chars() {
        if classify(ch).is_some() {
            run.push(ch);
        } else {
            flush_run(&mut run, &mut output);
            output.push(ch);
        }
    }
    flush_run(&mut run, &mut output);
    output
}

fn flush_run(run: &mut String, output: &mut String) {
    if run.is_empty() {
        return;
    }
    let (numeral, literal_zeros) = split_literal_zeros(run);
    if numeral.chars().all(|ch| ch.is_ascii_digit()) {
        output.push_str(run);
    } else {
        match parse_numeral(numeral) {
            Some(value) => {
                output.push_str(&value.to_string());
                output.push_str(literal_zeros);
            }
            None => output.push_str(run),
        }
    }
    run.clear();
}

/// Splits off a trailing block of ASCII `0`s that follows a Chinese numeral
/// (`十九00` from `十九世纪`), which is appended literally.
fn split_literal_zeros(run: &str) -> (&str, &str) {
    let head = run.trim_end_matches('0');
    match head.chars().last() {
        Some(last) if !last.is_ascii_digit() && head.len() < run.len() => {
            (head, &run[head.len()..])
        }
        _ => (run, ""),
    }
}

/// Evaluates one numeral run right to left.
///
/// Returns `None` when the run contains a non-numeral character or the value
/// does not fit in `u128`.
pub fn parse_numeral(run: &str) -> Option<u128> {
    let mut total: u128 = 0;
    let mut unit: u128 = 1;
    let mut section: u128 = 1;
    let mut ceiling: u128 = 1;
    let mut pending: Option<Pending> = None;

    for ch in run.chars().rev() {
        match classify(ch)? {
            NumeralChar::Digit(digit) => {
                let place = unit.checked_mul(section)?;
                total = total.checked_add(u128::from(digit).checked_mul(place)?)?;
                unit = unit.checked_mul(10)?;
                pending = None;
            }
            NumeralChar::Zero => match pending {
                Some(Pending::Unit) => {
                    total = total.checked_add(unit.checked_mul(section)?)?;
                    pending = None;
                }
                Some(Pending::Section) => pending = None,
                None => unit = unit.checked_mul(10)?,
            },
            NumeralChar::Unit(value) => {
                if pending == Some(Pending::Unit) {
                    total = total.checked_add(unit.checked_mul(section)?)?;
                }
                unit = value;
                pending = Some(Pending::Unit);
            }
            NumeralChar::Section(value) => {
                if pending == Some(Pending::Unit) {
                    total = total.checked_add(unit.checked_mul(section)?)?;
                }
                if value <= ceiling {
                    section = section.checked_mul(value)?;
                } else {
                    section = value;
                    ceiling = value;
                }
                unit = 1;
                pending = Some(Pending::Section);
            }
        }
    }

    if pending.is_some() {
        total = total.checked_add(unit.checked_mul(section)?)?;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::{normalize_numerals, parse_numeral};

    #[test]
    fn parses_plain_units() {
        assert_eq!(parse_numeral("十"), Some(10));
        assert_eq!(parse_numeral("十五"), Some(15));
        assert_eq!(parse_numeral("二十"), Some(20));
        assert_eq!(parse_numeral("三百二十一"), Some(321));
        assert_eq!(parse_numeral("两千"), Some(2000));
        assert_eq!(parse_numeral("一百零五"), Some(105));
        assert_eq!(parse_numeral("一千零十"), Some(1010));
    }

    #[test]
    fn parses_positional_chinese_digits() {
        assert_eq!(parse_numeral("二〇二四"), Some(2024));
        assert_eq!(parse_numeral("一九四九"), Some(1949));
    }

    #[test]
    fn parses_mixed_arabic_and_units() {
        assert_eq!(parse_numeral("9百"), Some(900));
        assert_eq!(parse_numeral("3百"), Some(300));
        assert_eq!(parse_numeral("200万"), Some(2_000_000));
        assert_eq!(parse_numeral("1千5百"), Some(1500));
    }

    #[test]
    fn compounds_section_units() {
        assert_eq!(parse_numeral("万"), Some(10_000));
        assert_eq!(parse_numeral("十万"), Some(100_000));
        assert_eq!(parse_numeral("一百万"), Some(1_000_000));
        assert_eq!(parse_numeral("一亿五千万"), Some(150_000_000));
        assert_eq!(parse_numeral("三亿零五万"), Some(300_050_000));
        assert_eq!(parse_numeral("一万亿"), Some(1_000_000_000_000));
        assert_eq!(parse_numeral("一万五千亿"), Some(1_500_000_000_000));
        assert_eq!(
            parse_numeral("五万四千三百二十一万亿"),
            Some(54_321_000_000_000_000)
        );
    }

    #[test]
    fn normalize_rewrites_runs_in_place() {
        assert_eq!(normalize_numerals("公元前二百年十一月"), "公元前200年11月");
        assert_eq!(normalize_numerals("前一百万年"), "前1000000年");
        assert_eq!(normalize_numerals("前200万年"), "前2000000年");
        assert_eq!(normalize_numerals("2010年"), "2010年");
        assert_eq!(normalize_numerals("no numerals"), "no numerals");
    }

    #[test]
    fn century_suffix_zeros_stay_literal() {
        assert_eq!(normalize_numerals("十九00"), "1900");
        assert_eq!(normalize_numerals("二十00"), "2000");
        assert_eq!(normalize_numerals("3百20"), "320");
    }
}
