/// Permissive address shape check: `local@domain.tld`, where no part is empty
/// and none of them contain `@`.
///
/// Only the leading portion of the candidate has to match; anything after the
/// domain's next `@` is ignored. This is a syntactic filter for spreadsheet
/// noise, not RFC 5322 validation.
pub fn is_plausible_email(candidate: &str) -> bool {
    let Some((local, rest)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() {
        return false;
    }

    let domain = rest.split('@').next().unwrap_or_default();
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}
