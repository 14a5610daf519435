mod canvas;
mod frame;
mod window;
