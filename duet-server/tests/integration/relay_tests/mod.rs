mod test_unreachable_target;
