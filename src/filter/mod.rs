mod evaluate;
mod tag;

pub use evaluate::{apply, apply_indices, group, resolve, CategoryField, Filter, GroupedFilter};
pub use tag::{is_range_label, try_parse_range_tag, FilterTag, RangeField, RangeTag, RANGE_LABELS};
