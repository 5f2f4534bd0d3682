mod test_arc_length_basic;
mod test_points_basic;
