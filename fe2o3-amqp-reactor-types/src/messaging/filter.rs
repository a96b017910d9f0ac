//! Constructors for commonly used source filters

use crate::primitives::{Described, Descriptor, Symbol, Value};

use super::FilterSet;

/// Key of the JMS selector filter in a [`FilterSet`]
pub const SELECTOR_FILTER_NAME: &str = "jms-selector";

/// Descriptor code of the `apache.org:selector-filter:string` filter
pub const SELECTOR_FILTER_CODE: u64 = 0x0000_468c_0000_0004;

/// Builds a filter set holding a single JMS selector filter
pub fn selector(expression: impl Into<String>) -> FilterSet {
    described(
        SELECTOR_FILTER_NAME,
        SELECTOR_FILTER_CODE,
        Value::String(expression.into()),
    )
}

/// Builds a filter set holding one named described filter
pub fn described(
    name: impl Into<Symbol>,
    descriptor: impl Into<Descriptor>,
    value: impl Into<Value>,
) -> FilterSet {
    let mut set = FilterSet::new();
    set.insert(name.into(), Some(Described::new(descriptor, value.into())));
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_uses_the_selector_descriptor() {
        let set = selector("colour = 'green'");
        let filter = set
            .get(SELECTOR_FILTER_NAME)
            .and_then(Option::as_ref)
            .expect("selector filter");
        assert_eq!(filter.descriptor.code(), Some(0x0000_468C_0000_0004));
        assert_eq!(*filter, "colour = 'green'");
    }
}
