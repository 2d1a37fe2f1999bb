/// Run an optimistic mutation against `state`.
///
/// The snapshot is taken from `state` itself at the moment `apply` runs, so
/// a rollback always returns to what was visible right before this
/// operation. `commit` folds the authority's answer into the state.
pub fn optimistic<S, T, E>(
    state: &mut S,
    apply: impl FnOnce(&mut S),
    remote: impl FnOnce() -> Result<T, E>,
    commit: impl FnOnce(&mut S, &T),
) -> Result<T, E>
where
    S: Clone,
{
    let snapshot = state.clone();
    apply(state);
    match remote() {
        Ok(value) => {
            commit(state, &value);
            Ok(value)
        }
        Err(e) => {
            *state = snapshot;
            Err(e)
        }
    }
}
