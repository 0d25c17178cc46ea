/* PORTED NUMPY FUNCTIONS */

/// Returns the location of the maximum element in the array.
/// Ties resolve to the first occurrence.
///
/// # Arguments
///
/// * `arr` - Input array.
///
/// # Returns
///
/// * The location of the maximum element in the array, or `None` if the array is empty.
pub fn arg_max<'a>(arr: impl IntoIterator<Item = &'a f32>) -> Option<usize> {
    arr.into_iter()
        .enumerate()
        .reduce(|(max_index, max_value), (current_index, current_value)| {
            if current_value > max_value {
                (current_index, current_value)
            } else {
                (max_index, max_value)
            }
        })
        .map(|(index, _)| index)
}

/// Calculate the global max value in a 2D array, never below 0.
pub fn global_max<'a>(array: impl IntoIterator<Item = &'a f32>) -> f32 {
    array.into_iter().fold(0.0, |prev, &v| prev.max(v))
}
