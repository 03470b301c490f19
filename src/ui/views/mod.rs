pub mod city_detail;
pub mod city_list;
pub mod status;
