use myro::binding::{Binding, InputBindings};

fn null_count(bindings: &[Binding]) -> usize {
    bindings.iter().filter(|b| b.is_null()).count()
}

#[test]
fn bindings_are_reachable() {
    let bindings = InputBindings::with_count(3);
    assert_eq!(bindings.len(), 3);
    assert_eq!(null_count(bindings.as_slice()), 3);
    assert_eq!(bindings.reallocations(), 0);
    assert!(Binding::input().is_null());
}
