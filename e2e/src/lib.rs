#[cfg(test)]
mod introspection_filter;
#[cfg(test)]
mod policy_sets;
