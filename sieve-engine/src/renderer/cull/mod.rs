pub mod draw_cull_compute;
