//! Class-name parsing.
//!
//! Class names follow the local convention `<grade>年[级]<index>班`, where the
//! grade is a Chinese ordinal (`一`..`六`) or an Arabic digit, e.g. "三年1班" or
//! "3年级2班". The grade token drives display ordering and promotion.

/// Grade whose classes leave the school on promotion.
pub const GRADUATING_GRADE: u8 = 6;

const CHINESE_GRADES: [char; 6] = ['一', '二', '三', '四', '五', '六'];
const CHINESE_DIGITS: [char; 9] = ['一', '二', '三', '四', '五', '六', '七', '八', '九'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GradeStyle {
    Chinese,
    Arabic,
}

/// Splits a class name into (grade, style, remainder starting at `年`).
fn leading_grade(name: &str) -> Option<(u8, GradeStyle, &str)> {
    let first = name.chars().next()?;
    if let Some(pos) = CHINESE_GRADES.iter().position(|c| *c == first) {
        let rest = &name[first.len_utf8()..];
        let grade = u8::try_from(pos).ok()? + 1;
        return rest
            .starts_with('年')
            .then_some((grade, GradeStyle::Chinese, rest));
    }

    let digits_end = name
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(name.len());
    if digits_end == 0 {
        return None;
    }
    let grade: u8 = name[..digits_end].parse().ok()?;
    let rest = &name[digits_end..];
    (rest.starts_with('年') && (1..=GRADUATING_GRADE).contains(&grade))
        .then_some((grade, GradeStyle::Arabic, rest))
}

fn grade_token(grade: u8, style: GradeStyle) -> Option<String> {
    match style {
        GradeStyle::Chinese => CHINESE_GRADES
            .get(usize::from(grade).checked_sub(1)?)
            .map(char::to_string),
        GradeStyle::Arabic => Some(grade.to_string()),
    }
}

/// Parses the class index that follows the grade, e.g. `1` in "三年1班" or
/// "三年级(1)班".
fn class_index(after_grade: &str) -> Option<u32> {
    let rest = after_grade.strip_prefix('年')?;
    let rest = rest.strip_prefix('级').unwrap_or(rest);
    let rest = rest
        .strip_prefix('(')
        .or_else(|| rest.strip_prefix('（'))
        .unwrap_or(rest);

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end > 0 {
        return rest[..digits_end].parse().ok();
    }

    let first = rest.chars().next()?;
    CHINESE_DIGITS
        .iter()
        .position(|c| *c == first)
        .and_then(|pos| u32::try_from(pos + 1).ok())
}

/// Parses `(grade, class index)` out of a class name.
#[must_use]
pub fn parse_class_name(name: &str) -> Option<(u8, u32)> {
    let (grade, _, rest) = leading_grade(name.trim())?;
    Some((grade, class_index(rest)?))
}

/// Sort key for display: by grade, then class index, then name. Names that
/// cannot be parsed sort after every parseable one.
#[must_use]
pub fn class_sort_key(name: &str) -> (u8, u32, String) {
    parse_class_name(name).map_or_else(
        || (u8::MAX, u32::MAX, name.to_string()),
        |(grade, index)| (grade, index, name.to_string()),
    )
}

/// Sorts class names in display order.
pub fn sort_class_names(names: &mut [String]) {
    names.sort_by_cached_key(|name| class_sort_key(name));
}

/// True when the class belongs to the graduating grade.
#[must_use]
pub fn is_graduating(name: &str) -> bool {
    leading_grade(name.trim()).is_some_and(|(grade, _, _)| grade == GRADUATING_GRADE)
}

/// Name the class carries after promotion, keeping the ordinal style.
///
/// Returns `None` for graduating classes and for names without a grade token.
#[must_use]
pub fn next_grade_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    let (grade, style, rest) = leading_grade(trimmed)?;
    if grade >= GRADUATING_GRADE {
        return None;
    }
    Some(format!("{}{rest}", grade_token(grade + 1, style)?))
}
